//! scrcpy 连接握手.
//!
//! scrcpy 服务端依次建立视频, 音频, 控制三条连接. 第一条连接开头是 64 字节
//! 设备名 (NUL 填充); 每条媒体连接接着是 4 字节编码标识; 视频连接在编码标识
//! 之后还有大端 u32 宽度与高度. 控制连接没有握手数据.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use webscreen_codec::{CodecId, SpsInfo};
use webscreen_core::{MediaType, ScreenResult};

use crate::reader::map_read_error;

/// 设备名字段长度
pub const DEVICE_NAME_LENGTH: usize = 64;

/// 读取 64 字节设备名, 去除尾部 NUL
pub async fn read_device_meta<R: AsyncRead + Unpin>(reader: &mut R) -> ScreenResult<String> {
    let mut buf = [0u8; DEVICE_NAME_LENGTH];
    reader.read_exact(&mut buf).await.map_err(map_read_error)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// 读取 4 字节编码标识
pub async fn read_codec_id<R: AsyncRead + Unpin>(reader: &mut R) -> ScreenResult<CodecId> {
    let raw = reader.read_u32().await.map_err(map_read_error)?;
    CodecId::from_u32(raw)
}

/// 读取视频初始分辨率 (大端 u32 宽, 高)
pub async fn read_video_meta<R: AsyncRead + Unpin>(reader: &mut R) -> ScreenResult<(u32, u32)> {
    let width = reader.read_u32().await.map_err(map_read_error)?;
    let height = reader.read_u32().await.map_err(map_read_error)?;
    Ok((width, height))
}

/// 媒体连接的握手信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// 设备名 (只在第一条连接上出现)
    pub device_name: Option<String>,
    /// 编码
    pub codec: CodecId,
    /// 初始分辨率 (只有视频连接有)
    pub size: Option<(u32, u32)>,
}

impl StreamHeader {
    /// 连接承载的媒体类型
    pub fn media_type(&self) -> MediaType {
        self.codec.media_type()
    }
}

/// 读取一条媒体连接的完整握手
///
/// `first_connection` 为 `true` 时先读设备名.
pub async fn read_stream_header<R: AsyncRead + Unpin>(
    reader: &mut R,
    first_connection: bool,
) -> ScreenResult<StreamHeader> {
    let device_name = if first_connection {
        Some(read_device_meta(reader).await?)
    } else {
        None
    };
    let codec = read_codec_id(reader).await?;
    let size = match codec.media_type() {
        MediaType::Video => Some(read_video_meta(reader).await?),
        MediaType::Audio => None,
    };
    Ok(StreamHeader {
        device_name,
        codec,
        size,
    })
}

/// 媒体元信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaMeta {
    /// 设备名
    pub device_name: String,
    /// 视频编码
    pub video_codec: Option<CodecId>,
    /// 音频编码
    pub audio_codec: Option<CodecId>,
    /// 显示宽度
    pub width: u32,
    /// 显示高度
    pub height: u32,
}

impl MediaMeta {
    /// 合并一条连接的握手信息
    pub fn apply_stream_header(&mut self, header: &StreamHeader) {
        if let Some(name) = &header.device_name {
            self.device_name = name.clone();
        }
        match header.media_type() {
            MediaType::Video => {
                self.video_codec = Some(header.codec);
                if let Some((width, height)) = header.size {
                    self.width = width;
                    self.height = height;
                }
            }
            MediaType::Audio => self.audio_codec = Some(header.codec),
        }
    }

    /// 用 SPS 解析出的几何信息覆盖分辨率, 返回是否有变化
    pub fn apply_geometry(&mut self, info: &SpsInfo) -> bool {
        if (self.width, self.height) == (info.width, info.height) {
            return false;
        }
        self.width = info.width;
        self.height = info.height;
        true
    }
}
