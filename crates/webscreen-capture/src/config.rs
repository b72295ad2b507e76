//! 采集配置.
//!
//! 所有字段都有默认值, JSON 文件中只需写出要覆盖的字段.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use webscreen_core::{ScreenError, ScreenResult};

use crate::arena::{DEFAULT_AUDIO_ARENA_CAPACITY, DEFAULT_VIDEO_ARENA_CAPACITY};
use crate::keyframe::DEFAULT_KEYFRAME_COOLDOWN;

/// 采集配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 视频缓冲区容量 (字节)
    pub video_arena_capacity: usize,
    /// 音频缓冲区容量 (字节)
    pub audio_arena_capacity: usize,
    /// 输出通道深度
    pub channel_depth: usize,
    /// 关键帧请求冷却时间 (毫秒)
    pub keyframe_cooldown_ms: u64,
    /// H.264 SPS 是否应用 frame_cropping
    pub crop_h264: bool,
    /// scrcpy 服务端回连的监听地址
    pub listen_addr: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            video_arena_capacity: DEFAULT_VIDEO_ARENA_CAPACITY,
            audio_arena_capacity: DEFAULT_AUDIO_ARENA_CAPACITY,
            channel_depth: 10,
            keyframe_cooldown_ms: DEFAULT_KEYFRAME_COOLDOWN.as_millis() as u64,
            crop_h264: true,
            listen_addr: "127.0.0.1:27183".into(),
        }
    }
}

impl CaptureConfig {
    /// 从 JSON 文件加载并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> ScreenResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            ScreenError::InvalidArgument(format!("配置文件解析失败, path={}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 校验配置
    pub fn validate(&self) -> ScreenResult<()> {
        if self.video_arena_capacity == 0 || self.audio_arena_capacity == 0 {
            return Err(ScreenError::InvalidArgument("缓冲区容量不能为 0".into()));
        }
        if self.channel_depth == 0 {
            return Err(ScreenError::InvalidArgument("通道深度不能为 0".into()));
        }
        if self.listen_addr.trim().is_empty() {
            return Err(ScreenError::InvalidArgument("监听地址不能为空".into()));
        }
        Ok(())
    }

    /// 关键帧请求冷却时间
    pub fn keyframe_cooldown(&self) -> Duration {
        Duration::from_millis(self.keyframe_cooldown_ms)
    }
}
