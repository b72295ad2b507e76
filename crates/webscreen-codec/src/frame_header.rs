//! scrcpy 帧头编解码.
//!
//! 每个媒体包前有固定 12 字节帧头:
//!
//! ```text
//!  0                   7 8         11
//! +---------------------+-----------+
//! | flags | PTS (62bit) | size (u32)|
//! +---------------------+-----------+
//! ```
//!
//! 前 8 字节为大端 u64, bit 63 表示配置包, bit 62 表示关键帧, 低 62 位为
//! 微秒 PTS; 后 4 字节为大端 u32 负载长度.

use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use webscreen_core::{ScreenError, ScreenResult};

/// 帧头字节数
pub const FRAME_HEADER_SIZE: usize = 12;

const FLAG_CONFIG: u64 = 1 << 63;
const FLAG_KEYFRAME: u64 = 1 << 62;
/// PTS 有效位 (低 62 位)
pub const PTS_MASK: u64 = FLAG_KEYFRAME - 1;

/// 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// 是否为配置包 (编码器参数)
    pub is_config: bool,
    /// 是否为关键帧
    pub is_keyframe: bool,
    /// 显示时间戳 (微秒, 62 位)
    pub pts: u64,
    /// 负载长度 (字节)
    pub size: u32,
}

impl FrameHeader {
    /// 构造普通媒体帧头
    pub fn media(pts: u64, is_keyframe: bool, size: u32) -> Self {
        Self {
            is_config: false,
            is_keyframe,
            pts: pts & PTS_MASK,
            size,
        }
    }

    /// 构造配置包帧头
    pub fn config(size: u32) -> Self {
        Self {
            is_config: true,
            is_keyframe: false,
            pts: 0,
            size,
        }
    }

    /// 从字节解码, 不足 12 字节时返回错误
    pub fn decode(buf: &[u8]) -> ScreenResult<Self> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(ScreenError::InvalidData(format!(
                "帧头长度不足: {} < {}",
                buf.len(),
                FRAME_HEADER_SIZE
            )));
        }
        let flags_pts = BigEndian::read_u64(&buf[0..8]);
        let size = BigEndian::read_u32(&buf[8..12]);
        Ok(Self {
            is_config: flags_pts & FLAG_CONFIG != 0,
            is_keyframe: flags_pts & FLAG_KEYFRAME != 0,
            pts: flags_pts & PTS_MASK,
            size,
        })
    }

    /// 编码为 12 字节
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut flags_pts = self.pts & PTS_MASK;
        if self.is_config {
            flags_pts |= FLAG_CONFIG;
        }
        if self.is_keyframe {
            flags_pts |= FLAG_KEYFRAME;
        }
        let mut out = [0u8; FRAME_HEADER_SIZE];
        BigEndian::write_u64(&mut out[0..8], flags_pts);
        BigEndian::write_u32(&mut out[8..12], self.size);
        out
    }

    /// PTS 转为 [`Duration`]
    pub fn pts_duration(&self) -> Duration {
        Duration::from_micros(self.pts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_flags() {
        let mut buf = [0u8; 12];
        buf[0] = 0xC0;
        buf[7] = 0x10;
        buf[11] = 0x20;
        let header = FrameHeader::decode(&buf).unwrap();
        assert!(header.is_config);
        assert!(header.is_keyframe);
        assert_eq!(header.pts, 0x10);
        assert_eq!(header.size, 0x20);
    }

    #[test]
    fn test_round_trip() {
        let cases = [
            FrameHeader::media(0, false, 0),
            FrameHeader::media(PTS_MASK, true, u32::MAX),
            FrameHeader::media(1_234_567, false, 4096),
            FrameHeader::config(27),
            FrameHeader {
                is_config: true,
                is_keyframe: true,
                pts: 42,
                size: 1,
            },
        ];
        for header in cases {
            let decoded = FrameHeader::decode(&header.encode()).unwrap();
            assert_eq!(decoded, header, "帧头往返不一致");
        }
    }

    #[test]
    fn test_pts_masked_to_62_bits() {
        let header = FrameHeader::media(u64::MAX, false, 0);
        assert_eq!(header.pts, PTS_MASK);
        let decoded = FrameHeader::decode(&header.encode()).unwrap();
        assert!(!decoded.is_config, "PTS 高位不能泄漏到标志位");
        assert!(!decoded.is_keyframe);
    }

    #[test]
    fn test_decode_short_buffer() {
        let err = FrameHeader::decode(&[0u8; 11]).unwrap_err();
        assert!(matches!(err, ScreenError::InvalidData(_)));
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut buf = FrameHeader::media(9, true, 3).encode().to_vec();
        buf.extend_from_slice(&[0xAA, 0xBB]);
        assert_eq!(FrameHeader::decode(&buf).unwrap().size, 3);
    }

    #[test]
    fn test_pts_duration() {
        let header = FrameHeader::media(1_500_000, false, 0);
        assert_eq!(header.pts_duration(), Duration::from_millis(1500));
    }
}
