//! 采集管线集成测试.
//!
//! 用 `tokio::io::duplex` 模拟 scrcpy 的媒体连接与控制连接, 覆盖握手,
//! 分块到达的帧, 缓冲区换新与超大帧, 关键帧请求去抖以及 Opus 配置包封装.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use webscreen::capture::handshake::DEVICE_NAME_LENGTH;
use webscreen::capture::{
    CaptureConfig, CapturePipeline, FrameHeader, KeyframeOutcome, TYPE_REQUEST_IDR,
};
use webscreen::codec::demux::OPUS_CONFIG_MAGIC;
use webscreen::codec::{CodecId, MediaUnit, OpusHead, ParameterSetCache, StreamDemuxer};

// ============================================================
// 辅助函数
// ============================================================

const SPS_720P: &[u8] = &[0x67, 0x42, 0x00, 0x1F, 0xDA, 0x01, 0x40, 0x16, 0xE4];
const PPS: &[u8] = &[0x68, 0xCE, 0x38, 0x80];
const IDR: &[u8] = &[0x65, 0x88, 0x84, 0x21, 0xA0];

fn annex_b(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&[0, 0, 0, 1]);
        out.extend_from_slice(nal);
    }
    out
}

/// 首字节为普通 slice, 其余字节不含 0x00
fn slice_nal(len: usize, seed: u8) -> Vec<u8> {
    let mut nal = vec![0x41];
    nal.extend((1..len).map(|i| ((i as u8).wrapping_add(seed) % 250) + 1));
    nal
}

fn frame(header: FrameHeader, body: &[u8]) -> Vec<u8> {
    let mut out = header.encode().to_vec();
    out.extend_from_slice(body);
    out
}

fn media_frame(pts: u64, is_keyframe: bool, body: &[u8]) -> Vec<u8> {
    frame(FrameHeader::media(pts, is_keyframe, body.len() as u32), body)
}

fn video_handshake(name: &str, width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![0u8; DEVICE_NAME_LENGTH];
    out[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(b"h264");
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&height.to_be_bytes());
    out
}

async fn write_chunked<W: AsyncWrite + Unpin>(w: &mut W, data: &[u8], chunk: usize) {
    for part in data.chunks(chunk) {
        w.write_all(part).await.unwrap();
        tokio::task::yield_now().await;
    }
}

async fn drain(rx: &mut mpsc::Receiver<MediaUnit>) -> Vec<MediaUnit> {
    let mut units = Vec::new();
    while let Some(unit) = rx.recv().await {
        units.push(unit);
    }
    units
}

fn opus_head() -> Vec<u8> {
    let mut head = b"OpusHead".to_vec();
    head.push(1); // version
    head.push(2); // channels
    head.extend_from_slice(&312u16.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0i16.to_le_bytes());
    head.push(0); // mapping family
    head
}

// ============================================================
// 测试
// ============================================================

#[tokio::test]
async fn test_chunked_stream_matches_direct_demux() {
    let frames: Vec<(FrameHeader, Vec<u8>)> = vec![
        (FrameHeader::config(0), annex_b(&[SPS_720P, PPS])),
        (
            FrameHeader::media(0, true, 0),
            annex_b(&[SPS_720P, PPS, IDR, &slice_nal(90, 3)]),
        ),
        (
            FrameHeader::media(16_666, false, 0),
            annex_b(&[&slice_nal(300, 7), &slice_nal(12, 9)]),
        ),
        (FrameHeader::media(33_333, true, 0), annex_b(&[IDR])),
    ];

    // 参考结果: 直接对完整负载解复用
    let reference_demuxer =
        StreamDemuxer::new(CodecId::H264, Arc::new(ParameterSetCache::new()), true);
    let mut expected = Vec::new();
    let mut wire = Vec::new();
    for (header, body) in &frames {
        let header = FrameHeader {
            size: body.len() as u32,
            ..*header
        };
        expected.extend(reference_demuxer.demux(&header, Bytes::from(body.clone())));
        wire.extend(frame(header, body));
    }

    let mut pipeline = CapturePipeline::new(CaptureConfig::default()).unwrap();
    let (mut device, socket) = tokio::io::duplex(64);
    let mut rx = pipeline.start_stream(CodecId::H264, socket).unwrap();

    let writer = tokio::spawn(async move {
        write_chunked(&mut device, &wire, 7).await;
    });
    let units = drain(&mut rx).await;
    writer.await.unwrap();

    assert_eq!(units.len(), expected.len());
    for (i, (got, want)) in units.iter().zip(&expected).enumerate() {
        assert_eq!(got.data, want.data, "unit={i}");
        assert_eq!(got.pts, want.pts, "unit={i}");
        assert_eq!(got.is_config, want.is_config, "unit={i}");
        assert_eq!(got.is_keyframe, want.is_keyframe, "unit={i}");
    }

    let stats = pipeline.video_stats().unwrap();
    assert_eq!(stats.frames, frames.len() as u64);
    assert_eq!(stats.units, expected.len() as u64);
    pipeline.join().await.unwrap();
}

#[tokio::test]
async fn test_handshake_and_geometry_from_sps() {
    let mut pipeline = CapturePipeline::new(CaptureConfig::default()).unwrap();

    let (mut video_dev, video_sock) = tokio::io::duplex(1024);
    let (mut audio_dev, audio_sock) = tokio::io::duplex(1024);
    video_dev
        .write_all(&video_handshake("Pixel 7", 1920, 1080))
        .await
        .unwrap();
    audio_dev.write_all(b"opus").await.unwrap();

    let (video_header, mut video_rx) = pipeline.attach_stream(video_sock, true).await.unwrap();
    let (audio_header, mut audio_rx) = pipeline.attach_stream(audio_sock, false).await.unwrap();
    assert_eq!(video_header.device_name.as_deref(), Some("Pixel 7"));
    assert_eq!(video_header.size, Some((1920, 1080)));
    assert_eq!(audio_header.codec, CodecId::Opus);
    assert_eq!(audio_header.size, None);

    let meta = pipeline.media_meta();
    assert_eq!(meta.device_name, "Pixel 7");
    assert_eq!((meta.width, meta.height), (1920, 1080));

    // SPS 给出的分辨率覆盖握手中的初始值
    video_dev
        .write_all(&media_frame(0, true, &annex_b(&[SPS_720P, PPS, IDR])))
        .await
        .unwrap();
    for _ in 0..3 {
        video_rx.recv().await.unwrap();
    }
    let meta = pipeline.media_meta();
    assert_eq!(meta.video_codec, Some(CodecId::H264));
    assert_eq!(meta.audio_codec, Some(CodecId::Opus));
    assert_eq!((meta.width, meta.height), (1280, 720));

    drop(video_dev);
    drop(audio_dev);
    assert!(video_rx.recv().await.is_none());
    assert!(audio_rx.recv().await.is_none());
    pipeline.join().await.unwrap();
}

#[tokio::test]
async fn test_arena_rotation_and_oversized_frame() {
    let config = CaptureConfig {
        video_arena_capacity: 64,
        ..CaptureConfig::default()
    };
    let mut pipeline = CapturePipeline::new(config).unwrap();
    let (mut device, socket) = tokio::io::duplex(256);
    let mut rx = pipeline.start_stream(CodecId::H264, socket).unwrap();

    // 40 + 50 超出剩余容量触发换新, 200 超出总容量走单独分配
    let nals = [
        slice_nal(36, 1),
        slice_nal(46, 2),
        slice_nal(196, 3),
        slice_nal(36, 4),
    ];
    let mut wire = Vec::new();
    for (i, nal) in nals.iter().enumerate() {
        wire.extend(media_frame(i as u64 * 1000, false, &annex_b(&[nal])));
    }
    let writer = tokio::spawn(async move {
        write_chunked(&mut device, &wire, 33).await;
    });

    let units = drain(&mut rx).await;
    writer.await.unwrap();

    assert_eq!(units.len(), nals.len());
    for (unit, nal) in units.iter().zip(&nals) {
        assert_eq!(&unit.data[..], &nal[..], "边界处数据不应损坏");
    }

    let stats = pipeline.video_stats().unwrap();
    assert!(stats.rotations >= 1, "rotations={}", stats.rotations);
    assert_eq!(stats.oversized, 1);
    assert_eq!(stats.bytes, 40 + 50 + 200 + 40);
    pipeline.join().await.unwrap();
}

#[tokio::test]
async fn test_keyframe_request_debounced_through_pipeline() {
    let config = CaptureConfig {
        keyframe_cooldown_ms: 60_000,
        ..CaptureConfig::default()
    };
    let mut pipeline = CapturePipeline::new(config).unwrap();
    let (mut device, socket) = tokio::io::duplex(1024);
    let mut rx = pipeline.start_stream(CodecId::H264, socket).unwrap();

    device
        .write_all(&media_frame(250_000, true, &annex_b(&[SPS_720P, PPS, IDR])))
        .await
        .unwrap();
    for _ in 0..3 {
        rx.recv().await.unwrap();
    }

    let (control, mut control_dev) = tokio::io::duplex(16);
    pipeline.attach_control(control).await;

    assert_eq!(
        pipeline.request_keyframe().await.unwrap(),
        KeyframeOutcome::Requested
    );
    assert_eq!(
        pipeline.request_keyframe().await.unwrap(),
        KeyframeOutcome::Resent
    );

    let resent = [
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
        rx.recv().await.unwrap(),
    ];
    assert_eq!(&resent[0].data[..], SPS_720P);
    assert_eq!(&resent[1].data[..], PPS);
    assert_eq!(&resent[2].data[..], IDR);
    assert!(resent[0].is_config && resent[1].is_config);
    assert!(!resent[2].is_config && resent[2].is_keyframe);
    assert!(resent.iter().all(|u| u.pts == Duration::from_millis(250)));

    pipeline.shutdown();
    pipeline.join().await.unwrap();

    // 控制连接上只出现一次请求
    let mut written = Vec::new();
    control_dev.read_to_end(&mut written).await.unwrap();
    assert_eq!(written, vec![TYPE_REQUEST_IDR]);
}

#[tokio::test]
async fn test_keyframe_request_with_empty_cache_emits_nothing() {
    let config = CaptureConfig {
        keyframe_cooldown_ms: 60_000,
        ..CaptureConfig::default()
    };
    let mut pipeline = CapturePipeline::new(config).unwrap();
    let (_device, socket) = tokio::io::duplex(64);
    let mut rx = pipeline.start_stream(CodecId::H265, socket).unwrap();

    // 没有控制连接: 跳过; 冷却期内且缓存为空: 同样跳过
    assert_eq!(
        pipeline.request_keyframe().await.unwrap(),
        KeyframeOutcome::Skipped
    );
    assert_eq!(
        pipeline.request_keyframe().await.unwrap(),
        KeyframeOutcome::Skipped
    );
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());

    pipeline.shutdown();
    pipeline.join().await.unwrap();
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_opus_stream_config_wrapped() {
    let mut pipeline = CapturePipeline::new(CaptureConfig::default()).unwrap();
    let (mut device, socket) = tokio::io::duplex(256);
    let mut rx = pipeline.start_stream(CodecId::Opus, socket).unwrap();

    let head = opus_head();
    let packet: &[u8] = &[0xFC, 0xFF, 0xFE, 0x11];
    device
        .write_all(&frame(FrameHeader::config(head.len() as u32), &head))
        .await
        .unwrap();
    device
        .write_all(&media_frame(20_000, false, packet))
        .await
        .unwrap();
    drop(device);

    let units = drain(&mut rx).await;
    assert_eq!(units.len(), 2);

    let config = &units[0];
    assert!(config.is_config);
    assert!(config.data.starts_with(OPUS_CONFIG_MAGIC));
    assert_eq!(config.size(), OPUS_CONFIG_MAGIC.len() + 8 + head.len());
    let parsed = OpusHead::parse(&config.data).unwrap();
    assert_eq!(parsed.channels, 2);
    assert_eq!(parsed.pre_skip, 312);
    assert_eq!(parsed.sample_rate, 48_000);

    assert_eq!(&units[1].data[..], packet);
    assert_eq!(units[1].pts, Duration::from_millis(20));
    assert!(!units[1].is_config);

    let stats = pipeline.audio_stats().unwrap();
    assert_eq!(stats.frames, 2);
    pipeline.join().await.unwrap();
}

#[tokio::test]
async fn test_truncated_frame_ends_stream() {
    let mut pipeline = CapturePipeline::new(CaptureConfig::default()).unwrap();
    let (mut device, socket) = tokio::io::duplex(1024);
    let mut rx = pipeline.start_stream(CodecId::H264, socket).unwrap();

    let complete = annex_b(&[&slice_nal(20, 5)]);
    device
        .write_all(&media_frame(0, false, &complete))
        .await
        .unwrap();
    // 帧头声明 100 字节, 只写 10 字节后断开
    device
        .write_all(&FrameHeader::media(1000, false, 100).encode())
        .await
        .unwrap();
    device.write_all(&[0x41; 10]).await.unwrap();
    drop(device);

    let units = drain(&mut rx).await;
    assert_eq!(units.len(), 1);
    assert_eq!(&units[0].data[..], &complete[4..]);
    assert_eq!(pipeline.video_stats().unwrap().frames, 1);
    pipeline.join().await.unwrap();
}
