//! 解复用器.
//!
//! 把一帧 scrcpy 负载拆成按顺序排列的 [`MediaUnit`]:
//! - [`VideoDemuxer`]: H.264/H.265 按 NAL 拆分并维护参数集缓存, AV1 整帧透传
//! - [`AudioDemuxer`]: Opus 配置包封装, 其余整包透传
//!
//! 解复用是惰性的单次前向扫描, 输出与输入负载共享内存 (缓存重发除外).

pub mod audio;
pub mod video;

use std::sync::Arc;

use bytes::Bytes;
use webscreen_core::MediaType;

use crate::codec_id::CodecId;
use crate::frame_header::FrameHeader;
use crate::media_unit::MediaUnit;
use crate::param_cache::ParameterSetCache;

pub use audio::{AudioDemuxer, OPUS_CONFIG_MAGIC, OpusHead, wrap_opus_config};
pub use video::{VideoDemuxer, VideoUnits};

/// 按编码选择的解复用器
#[derive(Debug)]
pub enum StreamDemuxer {
    /// 视频
    Video(VideoDemuxer),
    /// 音频
    Audio(AudioDemuxer),
}

impl StreamDemuxer {
    /// 按编码创建解复用器
    ///
    /// 音频编码不使用 `cache` 与 `crop_h264`.
    pub fn new(codec: CodecId, cache: Arc<ParameterSetCache>, crop_h264: bool) -> Self {
        match codec.media_type() {
            MediaType::Video => Self::Video(VideoDemuxer::new(codec, cache, crop_h264)),
            MediaType::Audio => Self::Audio(AudioDemuxer::new(codec)),
        }
    }

    /// 编码
    pub fn codec(&self) -> CodecId {
        match self {
            Self::Video(d) => d.codec(),
            Self::Audio(d) => d.codec(),
        }
    }

    /// 拆分一帧负载
    pub fn demux(&self, header: &FrameHeader, payload: Bytes) -> DemuxUnits<'_> {
        match self {
            Self::Video(d) => DemuxUnits::Video(d.demux(header, payload)),
            Self::Audio(d) => DemuxUnits::Audio(d.demux(header, payload).into_iter()),
        }
    }
}

/// 一帧负载拆出的媒体单元序列
pub enum DemuxUnits<'a> {
    /// 视频单元
    Video(VideoUnits<'a>),
    /// 音频单元 (至多一个)
    Audio(std::option::IntoIter<MediaUnit>),
}

impl Iterator for DemuxUnits<'_> {
    type Item = MediaUnit;

    fn next(&mut self) -> Option<MediaUnit> {
        match self {
            Self::Video(units) => units.next(),
            Self::Audio(units) => units.next(),
        }
    }
}
