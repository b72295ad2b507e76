//! 编码标识符.
//!
//! scrcpy 在每条媒体连接开头发送 4 字节编码标识 (ASCII, 大端 u32),
//! 例如 `h264`, `h265`, `av1 `, `opus`.

use std::fmt;

use serde::Serialize;
use webscreen_core::{MediaType, ScreenError, ScreenResult};

/// 编码标识符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    // ========================
    // 视频
    // ========================
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// AV1
    Av1,

    // ========================
    // 音频
    // ========================
    /// Opus
    Opus,
    /// AAC
    Aac,
    /// 未压缩 PCM
    Raw,
}

impl CodecId {
    /// 全部已知编码
    pub const ALL: [CodecId; 6] = [
        Self::H264,
        Self::H265,
        Self::Av1,
        Self::Opus,
        Self::Aac,
        Self::Raw,
    ];

    /// 从 4 字节标识解析
    pub fn from_fourcc(fourcc: [u8; 4]) -> ScreenResult<Self> {
        Self::ALL
            .into_iter()
            .find(|id| id.fourcc() == fourcc)
            .ok_or_else(|| {
                ScreenError::Unsupported(format!(
                    "未知编码标识: {:?}",
                    String::from_utf8_lossy(&fourcc)
                ))
            })
    }

    /// 从大端 u32 形式的编码标识解析
    pub fn from_u32(raw: u32) -> ScreenResult<Self> {
        Self::from_fourcc(raw.to_be_bytes())
    }

    /// 线上 4 字节标识
    pub const fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::H264 => *b"h264",
            Self::H265 => *b"h265",
            Self::Av1 => *b"av1 ",
            Self::Opus => *b"opus",
            Self::Aac => *b"aac ",
            Self::Raw => *b"raw ",
        }
    }

    /// 对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::H264 | Self::H265 | Self::Av1 => MediaType::Video,
            Self::Opus | Self::Aac | Self::Raw => MediaType::Audio,
        }
    }

    /// 码流是否按 Annex B NAL 单元组织
    pub const fn is_annex_b(&self) -> bool {
        matches!(self, Self::H264 | Self::H265)
    }

    /// 人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "hevc",
            Self::Av1 => "av1",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Raw => "raw",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
