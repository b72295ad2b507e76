//! 视频解复用.
//!
//! # 输出顺序
//!
//! - 非关键帧: 参数集按出现顺序输出 (`is_config = true`), 切片按出现顺序输出.
//! - 关键帧: 帧内的参数集只写入缓存, 不在出现位置输出; 遇到第一个 IDR/CRA 时
//!   先输出缓存中的 [VPS (H.265), SPS, PPS] 副本, 再输出 IDR 本身.
//!   其余切片按出现顺序输出.
//! - 关键帧中写入了参数集但之后没有再输出过缓存 (没有 IDR, 或参数集位于 IDR 之后)
//!   时, 在帧末补发一次缓存参数集.
//!
//! SEI 与其他非 VCL 单元 (AUD, 填充数据等) 被丢弃.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, trace, warn};

use crate::codec_id::CodecId;
use crate::frame_header::FrameHeader;
use crate::media_unit::MediaUnit;
use crate::param_cache::ParameterSetCache;
use crate::parsers::NalRole;
use crate::parsers::annexb::AnnexBNals;
use crate::parsers::h264::{NalUnitType, parse_sps};
use crate::parsers::h265::{HevcNalUnitType, parse_hevc_sps};

/// 视频解复用器
#[derive(Debug)]
pub struct VideoDemuxer {
    codec: CodecId,
    cache: Arc<ParameterSetCache>,
    crop_h264: bool,
}

impl VideoDemuxer {
    /// 创建视频解复用器
    ///
    /// `crop_h264` 控制 H.264 SPS 解析时是否应用 frame_cropping.
    pub fn new(codec: CodecId, cache: Arc<ParameterSetCache>, crop_h264: bool) -> Self {
        Self {
            codec,
            cache,
            crop_h264,
        }
    }

    /// 编码
    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /// 参数集缓存
    pub fn cache(&self) -> &Arc<ParameterSetCache> {
        &self.cache
    }

    /// 拆分一帧负载
    pub fn demux(&self, header: &FrameHeader, payload: Bytes) -> VideoUnits<'_> {
        let pts = header.pts_duration();
        if !header.is_config {
            self.cache.set_last_pts(pts);
        }

        if self.codec.is_annex_b() {
            return VideoUnits {
                demuxer: self,
                nals: AnnexBNals::new(payload),
                pts,
                keyframe_frame: header.is_keyframe,
                pending: VecDeque::new(),
                absorbed: false,
                resent: false,
            };
        }

        // AV1: 整帧透传
        let mut pending = VecDeque::with_capacity(1);
        if !payload.is_empty() {
            pending.push_back(MediaUnit {
                data: payload,
                pts,
                is_keyframe: header.is_keyframe,
                is_config: header.is_config,
            });
        }
        VideoUnits {
            demuxer: self,
            nals: AnnexBNals::new(Bytes::new()),
            pts,
            keyframe_frame: header.is_keyframe,
            pending,
            absorbed: false,
            resent: false,
        }
    }

    fn classify(&self, nal: &[u8]) -> NalRole {
        match self.codec {
            CodecId::H265 => HevcNalUnitType::from_header(nal[0]).role(),
            _ => NalUnitType::from_header(nal[0]).role(),
        }
    }

    fn store_parameter_set(&self, role: NalRole, nal: &[u8]) {
        match role {
            NalRole::Vps => self.cache.update_vps(nal),
            NalRole::Pps => self.cache.update_pps(nal),
            NalRole::Sps => self.store_sps(nal),
            _ => {}
        }
    }

    /// SPS 变化时重新解析几何信息
    fn store_sps(&self, nal: &[u8]) {
        if !self.cache.sps_changed(nal) {
            return;
        }
        let parsed = match self.codec {
            CodecId::H265 => parse_hevc_sps(nal),
            _ => parse_sps(nal, self.crop_h264),
        };
        let geometry = match parsed {
            Ok(info) => {
                info!(
                    "{} SPS 更新: {}, profile={}, level={}",
                    self.codec,
                    info.resolution(),
                    info.profile,
                    info.level
                );
                Some(info)
            }
            Err(e) => {
                warn!("{} SPS 解析失败, 保留原几何信息: {}", self.codec, e);
                None
            }
        };
        self.cache.update_sps(nal, geometry);
    }
}

/// 一帧视频负载拆出的媒体单元
///
/// 惰性迭代: 每次 `next` 只扫描到下一个可输出的单元, 缓存在扫描过程中更新.
pub struct VideoUnits<'a> {
    demuxer: &'a VideoDemuxer,
    nals: AnnexBNals,
    pts: Duration,
    keyframe_frame: bool,
    pending: VecDeque<MediaUnit>,
    /// 关键帧中写入了参数集, 还没有随缓存一起输出
    absorbed: bool,
    /// 本帧已在 IDR 之前输出过缓存参数集
    resent: bool,
}

impl VideoUnits<'_> {
    fn push_cached_parameter_sets(&mut self) {
        let sets = self.demuxer.cache.parameter_sets();
        for data in [sets.vps, sets.sps, sets.pps].into_iter().flatten() {
            self.pending.push_back(MediaUnit::config(data, self.pts));
        }
    }
}

impl Iterator for VideoUnits<'_> {
    type Item = MediaUnit;

    fn next(&mut self) -> Option<MediaUnit> {
        loop {
            if let Some(unit) = self.pending.pop_front() {
                return Some(unit);
            }

            let Some(nal) = self.nals.next() else {
                if self.absorbed {
                    self.absorbed = false;
                    self.push_cached_parameter_sets();
                    continue;
                }
                return None;
            };

            let role = self.demuxer.classify(&nal);
            match role {
                NalRole::Vps | NalRole::Sps | NalRole::Pps => {
                    debug!("{} 参数集 {:?}, {} 字节", self.demuxer.codec, role, nal.len());
                    self.demuxer.store_parameter_set(role, &nal);
                    if self.keyframe_frame {
                        self.absorbed = true;
                    } else {
                        return Some(MediaUnit::config(nal, self.pts));
                    }
                }
                NalRole::Keyframe => {
                    self.demuxer.cache.update_idr(&nal);
                    if !self.resent {
                        self.resent = true;
                        self.absorbed = false;
                        self.push_cached_parameter_sets();
                    }
                    self.pending.push_back(MediaUnit::media(nal, self.pts, true));
                }
                NalRole::Slice => return Some(MediaUnit::media(nal, self.pts, false)),
                NalRole::Sei => trace!("{} 丢弃 SEI, {} 字节", self.demuxer.codec, nal.len()),
                NalRole::Other => trace!(
                    "{} 丢弃非 VCL 单元, 头字节=0x{:02X}",
                    self.demuxer.codec,
                    nal[0]
                ),
            }
        }
    }
}
