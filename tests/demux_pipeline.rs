//! 帧头与 NAL 解复用集成测试.
//!
//! 覆盖帧头编解码, 起始码拆分与参考拆分的一致性, 关键帧前的参数集顺序,
//! 缓存副本的独立性, SEI 过滤以及 Exp-Golomb 码表.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use webscreen::codec::frame_header::PTS_MASK;
use webscreen::codec::{CodecId, FrameHeader, MediaUnit, ParameterSetCache, StreamDemuxer};
use webscreen::core::bitreader::BitReader;
use webscreen::core::bitwriter::BitWriter;

// ============================================================
// 辅助函数
// ============================================================

/// 确定性伪随机序列 (LCG)
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    /// 不含 0x00 的字节, 保证负载中不会出现起始码
    fn non_zero_byte(&mut self) -> u8 {
        (self.next() % 255) as u8 + 1
    }
}

fn annex_b(nals: &[&[u8]]) -> Bytes {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    Bytes::from(out)
}

/// 1280x720 Baseline SPS (含 NAL 头 0x67)
fn sps_720p() -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0x67, 8);
    bw.write_bits(66, 8); // profile_idc
    bw.write_bits(0, 8); // constraint flags
    bw.write_bits(31, 8); // level_idc
    bw.write_ue(0); // sps_id
    bw.write_ue(0); // log2_max_frame_num_minus4
    bw.write_ue(2); // pic_order_cnt_type
    bw.write_ue(1); // max_num_ref_frames
    bw.write_flag(false);
    bw.write_ue(79);
    bw.write_ue(44);
    bw.write_flag(true); // frame_mbs_only_flag
    bw.write_flag(true); // direct_8x8_inference_flag
    bw.write_flag(false); // frame_cropping_flag
    bw.write_flag(false); // vui_parameters_present_flag
    bw.write_trailing_bits();
    bw.finish()
}

const PPS: &[u8] = &[0x68, 0xCE, 0x38, 0x80];
const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21, 0xA0];

fn h264_demuxer() -> (StreamDemuxer, Arc<ParameterSetCache>) {
    let cache = Arc::new(ParameterSetCache::new());
    (StreamDemuxer::new(CodecId::H264, cache.clone(), true), cache)
}

fn demux_all(demuxer: &StreamDemuxer, header: FrameHeader, payload: Bytes) -> Vec<MediaUnit> {
    demuxer.demux(&header, payload).collect()
}

fn range_of(data: &Bytes) -> Range<usize> {
    let start = data.as_ptr() as usize;
    start..start + data.len()
}

fn aliases(unit: &MediaUnit, payload: &Range<usize>) -> bool {
    let r = range_of(&unit.data);
    r.start >= payload.start && r.end <= payload.end
}

// ============================================================
// 帧头
// ============================================================

#[test]
fn test_frame_header_round_trip() {
    for pts in [0u64, 1, 33_333, 1 << 40, PTS_MASK - 1, PTS_MASK] {
        for is_keyframe in [false, true] {
            let header = FrameHeader::media(pts, is_keyframe, 4096);
            let decoded = FrameHeader::decode(&header.encode()).unwrap();
            assert_eq!(decoded, header, "pts={pts}, keyframe={is_keyframe}");
            assert_eq!(decoded.pts, pts);
        }
    }

    let config = FrameHeader::config(27);
    let decoded = FrameHeader::decode(&config.encode()).unwrap();
    assert!(decoded.is_config);
    assert!(!decoded.is_keyframe);
    assert_eq!(decoded.size, 27);
}

#[test]
fn test_frame_header_short_input_rejected() {
    let bytes = FrameHeader::media(5, true, 1).encode();
    assert!(FrameHeader::decode(&bytes[..11]).is_err());
}

// ============================================================
// 拆分
// ============================================================

#[test]
fn test_demux_matches_reference_split() {
    let mut rng = Lcg(0x5eed);
    for round in 0..50 {
        let count = 1 + (rng.next() % 8) as usize;
        let nals: Vec<Vec<u8>> = (0..count)
            .map(|_| {
                let len = 1 + (rng.next() % 300) as usize;
                // 首字节固定为普通 slice (nal_ref_idc=2, type=1)
                let mut nal = vec![0x41];
                nal.extend((1..len).map(|_| rng.non_zero_byte()));
                nal
            })
            .collect();
        let refs: Vec<&[u8]> = nals.iter().map(Vec::as_slice).collect();
        let payload = annex_b(&refs);

        let (demuxer, _) = h264_demuxer();
        let header = FrameHeader::media(round, false, payload.len() as u32);
        let units = demux_all(&demuxer, header, payload);

        assert_eq!(units.len(), nals.len(), "round={round}");
        for (unit, nal) in units.iter().zip(&nals) {
            assert_eq!(&unit.data[..], &nal[..], "round={round}");
            assert!(!unit.is_config);
            assert!(!unit.is_keyframe);
            assert_eq!(unit.pts, Duration::from_micros(round));
        }
    }
}

#[test]
fn test_demux_slices_are_zero_copy() {
    let payload = annex_b(&[&[0x41, 0x9A, 0x02], &[0x01, 0x9B, 0x03, 0x04]]);
    let range = range_of(&payload);
    let (demuxer, _) = h264_demuxer();
    let units = demux_all(&demuxer, FrameHeader::media(0, false, 0), payload);
    assert_eq!(units.len(), 2);
    assert!(units.iter().all(|u| aliases(u, &range)), "slice 应引用原始负载");
}

// ============================================================
// 参数集与关键帧
// ============================================================

#[test]
fn test_keyframe_order_and_cache_contents() {
    let sps = sps_720p();
    let payload = annex_b(&[sps.as_slice(), PPS, IDR]);
    let (demuxer, cache) = h264_demuxer();

    let units = demux_all(&demuxer, FrameHeader::media(40_000, true, 0), payload);
    let firsts: Vec<u8> = units.iter().map(|u| u.data[0]).collect();
    assert_eq!(firsts, vec![0x67, 0x68, 0x65], "顺序应为 SPS, PPS, IDR");
    assert!(units[0].is_config && units[1].is_config);
    assert!(!units[2].is_config && units[2].is_keyframe);
    assert_eq!(&units[0].data[..], &sps[..]);
    assert_eq!(&units[1].data[..], PPS);
    assert_eq!(&units[2].data[..], IDR);

    assert_eq!(cache.sps().as_deref(), Some(&sps[..]));
    assert_eq!(cache.pps().as_deref(), Some(PPS));
    assert_eq!(cache.last_idr().as_deref(), Some(IDR));
    assert!(cache.vps().is_none());

    let geometry = cache.geometry().expect("SPS 应解析成功");
    assert_eq!((geometry.width, geometry.height), (1280, 720));
    assert_eq!(cache.last_pts(), Duration::from_millis(40));
}

#[test]
fn test_idr_only_frame_gets_cached_parameter_sets() {
    let sps = sps_720p();
    let (demuxer, cache) = h264_demuxer();
    let first = annex_b(&[sps.as_slice(), PPS, IDR]);
    demux_all(&demuxer, FrameHeader::media(0, true, 0), first);

    let idr2: &[u8] = &[0x65, 0x88, 0x80, 0x40];
    let payload = annex_b(&[idr2]);
    let range = range_of(&payload);
    let units = demux_all(&demuxer, FrameHeader::media(33_000, true, 0), payload);

    assert_eq!(units.len(), 3);
    assert_eq!(&units[0].data[..], &sps[..]);
    assert!(units[0].is_config);
    assert_eq!(&units[1].data[..], PPS);
    assert!(units[1].is_config);
    assert_eq!(&units[2].data[..], idr2);
    assert!(!units[2].is_config);

    // 参数集是独立副本, IDR 直接引用负载
    assert!(!aliases(&units[0], &range));
    assert!(!aliases(&units[1], &range));
    assert!(aliases(&units[2], &range));

    let cached_sps = cache.sps().unwrap();
    assert_ne!(units[0].data.as_ptr(), cached_sps.as_ptr());
    let mut owned = units[0].data.to_vec();
    owned.iter_mut().for_each(|b| *b = 0xFF);
    assert_eq!(cache.sps().as_deref(), Some(&sps[..]), "修改副本不应影响缓存");
    assert_eq!(cache.last_idr().as_deref(), Some(idr2));
}

#[test]
fn test_non_keyframe_config_in_encounter_order() {
    let sps = sps_720p();
    let slice: &[u8] = &[0x41, 0x9A];
    let payload = annex_b(&[PPS, sps.as_slice(), slice]);
    let (demuxer, _) = h264_demuxer();
    let units = demux_all(&demuxer, FrameHeader::media(0, false, 0), payload);
    let firsts: Vec<u8> = units.iter().map(|u| u.data[0]).collect();
    assert_eq!(firsts, vec![0x68, 0x67, 0x41]);
    assert!(units[0].is_config && units[1].is_config && !units[2].is_config);
}

#[test]
fn test_corrupt_sps_keeps_previous_geometry() {
    let (demuxer, cache) = h264_demuxer();
    demux_all(
        &demuxer,
        FrameHeader::media(0, true, 0),
        annex_b(&[sps_720p().as_slice(), PPS, IDR]),
    );

    let truncated: &[u8] = &[0x67, 0x64, 0x00];
    let units = demux_all(
        &demuxer,
        FrameHeader::config(0),
        annex_b(&[truncated]),
    );
    assert_eq!(units.len(), 1, "损坏的 SPS 仍然向下游转发");

    let geometry = cache.geometry().unwrap();
    assert_eq!((geometry.width, geometry.height), (1280, 720));
}

// ============================================================
// SEI
// ============================================================

#[test]
fn test_sei_never_forwarded() {
    let sei: &[u8] = &[0x06, 0x05, 0x10, 0xAA];
    let slice: &[u8] = &[0x41, 0x9A];
    let sps = sps_720p();
    let layouts: Vec<Vec<&[u8]>> = vec![
        vec![sei, slice],
        vec![slice, sei],
        vec![sei, sps.as_slice(), sei, PPS, sei, IDR, sei],
        vec![sei],
    ];
    for (i, layout) in layouts.iter().enumerate() {
        let (demuxer, _) = h264_demuxer();
        for keyframe in [false, true] {
            let units = demux_all(
                &demuxer,
                FrameHeader::media(0, keyframe, 0),
                annex_b(layout),
            );
            assert!(
                units.iter().all(|u| u.data[0] & 0x1F != 6),
                "layout={i}, keyframe={keyframe}"
            );
        }
    }
}

#[test]
fn test_hevc_sei_never_forwarded() {
    let prefix_sei: &[u8] = &[0x4E, 0x01, 0x05, 0x10];
    let suffix_sei: &[u8] = &[0x50, 0x01, 0x05, 0x10];
    let trail: &[u8] = &[0x02, 0x01, 0xD0];
    let cache = Arc::new(ParameterSetCache::new());
    let demuxer = StreamDemuxer::new(CodecId::H265, cache, true);
    let units = demux_all(
        &demuxer,
        FrameHeader::media(0, false, 0),
        annex_b(&[prefix_sei, trail, suffix_sei]),
    );
    assert_eq!(units.len(), 1);
    assert_eq!(&units[0].data[..], trail);
}

// ============================================================
// Exp-Golomb
// ============================================================

#[test]
fn test_exp_golomb_code_table() {
    // 1 | 010 | 011 | 00100
    let data = [0b1010_0110, 0b0100_0000];
    let mut br = BitReader::new(&data);
    assert_eq!(br.read_ue(), 0);
    assert_eq!(br.read_ue(), 1);
    assert_eq!(br.read_ue(), 2);
    assert_eq!(br.read_ue(), 3);
    assert!(!br.is_overrun());
}
