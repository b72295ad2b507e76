//! 媒体单元.
//!
//! 解复用器的输出, 一个 NAL 单元 (H.264/H.265) 或一个完整音频/AV1 包.

use std::time::Duration;

use bytes::Bytes;

/// 媒体单元
///
/// `data` 可能是采集缓冲区切片的零拷贝视图, 也可能是从参数集缓存
/// 深拷贝出来的独立数据, 两者对下游没有区别: 只要还持有引用, 数据就保持有效.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUnit {
    /// 负载 (不含起始码)
    pub data: Bytes,
    /// 显示时间戳
    pub pts: Duration,
    /// 是否为关键帧 (IDR/CRA 或帧头标记的关键帧)
    pub is_keyframe: bool,
    /// 是否为配置数据 (VPS/SPS/PPS, Opus 头等)
    pub is_config: bool,
}

impl MediaUnit {
    /// 普通媒体数据
    pub fn media(data: Bytes, pts: Duration, is_keyframe: bool) -> Self {
        Self {
            data,
            pts,
            is_keyframe,
            is_config: false,
        }
    }

    /// 配置数据
    pub fn config(data: Bytes, pts: Duration) -> Self {
        Self {
            data,
            pts,
            is_keyframe: false,
            is_config: true,
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 写入下游时应使用的样本时长
    ///
    /// 配置数据不占用播放时长.
    pub fn sample_duration(&self, frame_interval: Duration) -> Duration {
        if self.is_config {
            Duration::ZERO
        } else {
            frame_interval
        }
    }
}
