//! 音频解复用与 Opus 头解析.
//!
//! 音频帧不需要拆包, 每个 scrcpy 包就是一个完整的编码帧, 直接透传.
//! 配置包按编码处理:
//! - Opus: 包装为 `AOPUSHC` + 小端 u64 长度 + OpusHead, 作为独立配置单元输出
//! - AAC / raw: 丢弃 (下游不需要)

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use log::{debug, info};
use webscreen_core::{ScreenError, ScreenResult};

use crate::codec_id::CodecId;
use crate::frame_header::FrameHeader;
use crate::media_unit::MediaUnit;

/// Opus 配置包装魔数
pub const OPUS_CONFIG_MAGIC: &[u8; 7] = b"AOPUSHC";

/// OpusHead 魔数
const OPUS_HEAD_MAGIC: &[u8; 8] = b"OpusHead";

/// OpusHead 最小长度
const OPUS_HEAD_MIN_SIZE: usize = 19;

/// 音频解复用器
#[derive(Debug)]
pub struct AudioDemuxer {
    codec: CodecId,
}

impl AudioDemuxer {
    /// 创建音频解复用器
    pub fn new(codec: CodecId) -> Self {
        Self { codec }
    }

    /// 编码
    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /// 处理一帧音频负载, 至多产生一个单元
    pub fn demux(&self, header: &FrameHeader, payload: Bytes) -> Option<MediaUnit> {
        let pts = header.pts_duration();
        if header.is_config {
            if self.codec != CodecId::Opus {
                debug!("{} 丢弃音频配置包, {} 字节", self.codec, payload.len());
                return None;
            }
            match OpusHead::parse(&payload) {
                Ok(head) => info!(
                    "Opus 配置: {} 声道, {} Hz, pre_skip={}",
                    head.channels, head.sample_rate, head.pre_skip
                ),
                Err(e) => debug!("Opus 配置头无法识别: {}", e),
            }
            return Some(MediaUnit::config(wrap_opus_config(&payload), pts));
        }

        if payload.is_empty() {
            return None;
        }
        Some(MediaUnit::media(payload, pts, header.is_keyframe))
    }
}

/// 将 Opus 配置包装为 `AOPUSHC` + 小端 u64 长度 + 负载
pub fn wrap_opus_config(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(OPUS_CONFIG_MAGIC.len() + 8 + payload.len());
    buf.put_slice(OPUS_CONFIG_MAGIC);
    buf.put_u64_le(payload.len() as u64);
    buf.put_slice(payload);
    buf.freeze()
}

/// Opus 标识头 (RFC 7845 §5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    /// 版本
    pub version: u8,
    /// 声道数
    pub channels: u8,
    /// 解码前需丢弃的样本数 (48 kHz)
    pub pre_skip: u16,
    /// 原始采样率
    pub sample_rate: u32,
    /// 输出增益 (Q7.8 dB)
    pub output_gain: i16,
    /// 声道映射族
    pub mapping_family: u8,
}

impl OpusHead {
    /// 解析 OpusHead
    ///
    /// 同时接受裸 OpusHead 与 `AOPUSHC` 包装后的数据.
    pub fn parse(data: &[u8]) -> ScreenResult<Self> {
        let data = match data.strip_prefix(OPUS_CONFIG_MAGIC.as_slice()) {
            Some(rest) if rest.len() >= 8 => &rest[8..],
            Some(_) => {
                return Err(ScreenError::InvalidData("Opus: 配置包装长度不足".into()));
            }
            None => data,
        };

        if data.len() < OPUS_HEAD_MIN_SIZE {
            return Err(ScreenError::InvalidData(format!(
                "Opus: OpusHead 太短, len={}",
                data.len()
            )));
        }
        if &data[0..8] != OPUS_HEAD_MAGIC {
            return Err(ScreenError::InvalidData("Opus: 缺少 OpusHead 魔数".into()));
        }

        Ok(Self {
            version: data[8],
            channels: data[9],
            pre_skip: LittleEndian::read_u16(&data[10..12]),
            sample_rate: LittleEndian::read_u32(&data[12..16]),
            output_gain: LittleEndian::read_i16(&data[16..18]),
            mapping_family: data[18],
        })
    }
}
