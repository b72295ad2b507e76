//! 关键帧请求协调.
//!
//! 下游 (新加入的观看者, 丢包恢复) 需要关键帧时调用
//! [`KeyframeRequester::request_keyframe`]. 距上次向设备请求不足冷却时间时
//! 不再打扰设备, 改为把缓存中的 [VPS, SPS, PPS, IDR] 副本直接送入视频通道;
//! 缓存不完整时什么也不做.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use webscreen_codec::{CodecId, MediaUnit, ParameterSetCache};
use webscreen_core::ScreenResult;

/// scrcpy 控制协议中的 "请求 IDR" 消息类型
pub const TYPE_REQUEST_IDR: u8 = 99;

/// 默认冷却时间
pub const DEFAULT_KEYFRAME_COOLDOWN: Duration = Duration::from_secs(1);

type ControlWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// 请求状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Idle,
    RequestSent(Instant),
}

/// 一次请求的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyframeOutcome {
    /// 已向设备发送请求
    Requested,
    /// 冷却期内, 已从缓存重发
    Resent,
    /// 冷却期内且缓存不完整, 或没有可用的通道
    Skipped,
}

/// 视频输出通道 (弱引用, 不阻止通道关闭)
struct VideoSink {
    codec: CodecId,
    tx: mpsc::WeakSender<MediaUnit>,
}

/// 关键帧请求协调器
pub struct KeyframeRequester {
    cache: Arc<ParameterSetCache>,
    cooldown: Duration,
    state: Mutex<RequestState>,
    video: Mutex<Option<VideoSink>>,
    control: tokio::sync::Mutex<Option<ControlWriter>>,
}

impl KeyframeRequester {
    /// 创建协调器
    pub fn new(cache: Arc<ParameterSetCache>, cooldown: Duration) -> Self {
        Self {
            cache,
            cooldown,
            state: Mutex::new(RequestState::Idle),
            video: Mutex::new(None),
            control: tokio::sync::Mutex::new(None),
        }
    }

    /// 冷却时间
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// 绑定视频输出通道, 缓存重发的单元将送入此通道
    pub fn bind_video(&self, codec: CodecId, tx: &mpsc::Sender<MediaUnit>) {
        let sink = VideoSink {
            codec,
            tx: tx.downgrade(),
        };
        *self.video.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    /// 绑定控制连接
    pub async fn attach_control<W>(&self, writer: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        *self.control.lock().await = Some(Box::new(writer));
        debug!("控制连接已绑定");
    }

    /// 请求关键帧
    ///
    /// 写控制连接失败时返回错误, 采集管线不受影响.
    pub async fn request_keyframe(&self) -> ScreenResult<KeyframeOutcome> {
        let now = Instant::now();
        let within_cooldown = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                RequestState::RequestSent(at) if now.duration_since(at) < self.cooldown => true,
                _ => {
                    *state = RequestState::RequestSent(now);
                    false
                }
            }
        };

        if within_cooldown {
            return Ok(self.resend_from_cache());
        }

        let mut control = self.control.lock().await;
        let Some(writer) = control.as_mut() else {
            debug!("没有控制连接, 跳过关键帧请求");
            return Ok(KeyframeOutcome::Skipped);
        };

        let written = async {
            writer.write_all(&[TYPE_REQUEST_IDR]).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!("发送关键帧请求失败: {}", e);
            return Err(e.into());
        }

        info!("已向设备请求关键帧");
        Ok(KeyframeOutcome::Requested)
    }

    /// 从缓存异步重发 [VPS, SPS, PPS, IDR]
    fn resend_from_cache(&self) -> KeyframeOutcome {
        let (codec, tx) = {
            let video = self.video.lock().unwrap_or_else(PoisonError::into_inner);
            match video.as_ref() {
                Some(sink) => (sink.codec, sink.tx.upgrade()),
                None => return KeyframeOutcome::Skipped,
            }
        };
        let Some(tx) = tx else {
            debug!("视频通道已关闭, 跳过缓存重发");
            return KeyframeOutcome::Skipped;
        };
        let Some(set) = self.cache.keyframe_set(codec == CodecId::H265) else {
            debug!("冷却期内且缓存不完整, 跳过关键帧请求");
            return KeyframeOutcome::Skipped;
        };

        debug!("冷却期内, 从缓存重发关键帧");
        tokio::spawn(async move {
            for unit in set.into_units() {
                if tx.send(unit).await.is_err() {
                    break;
                }
            }
        });
        KeyframeOutcome::Resent
    }
}
