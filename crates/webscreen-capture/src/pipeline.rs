//! 采集管线.
//!
//! 每种媒体一个 tokio 任务: 读帧头 → 切缓冲区读负载 → 解复用 → 有界通道.
//! 通道满时记一次阻塞并等待下游, 从不丢弃单元. 任务在读取出错或收到停止信号时
//! 结束, 发送端随之释放, 下游看到通道关闭.
//!
//! 视频与音频任务互相独立, 只通过参数集缓存共享状态.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{info, warn};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use webscreen_codec::{CodecId, MediaUnit, ParameterSetCache, StreamDemuxer};
use webscreen_core::{MediaType, ScreenError, ScreenResult};

use crate::arena::ArenaBuffer;
use crate::config::CaptureConfig;
use crate::handshake::{MediaMeta, StreamHeader, read_stream_header};
use crate::keyframe::{KeyframeOutcome, KeyframeRequester};
use crate::reader::FrameReader;

/// 采集任务统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// 已读取帧数
    pub frames: u64,
    /// 已读取负载字节数
    pub bytes: u64,
    /// 已输出单元数
    pub units: u64,
    /// 通道满导致的阻塞次数
    pub stalls: u64,
    /// 缓冲区换新次数
    pub rotations: u64,
    /// 超大帧单独分配次数
    pub oversized: u64,
}

/// 采集任务计数器
#[derive(Debug, Default)]
pub struct WorkerStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    units: AtomicU64,
    stalls: AtomicU64,
    rotations: AtomicU64,
    oversized: AtomicU64,
}

impl WorkerStats {
    fn record_frame(&self, len: usize, arena: &ArenaBuffer) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        self.rotations.store(arena.rotations(), Ordering::Relaxed);
        self.oversized.store(arena.oversized_allocations(), Ordering::Relaxed);
    }

    /// 当前快照
    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            units: self.units.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
        }
    }
}

/// 已启动的采集任务
pub struct StreamHandle {
    codec: CodecId,
    stats: Arc<WorkerStats>,
    task: JoinHandle<ScreenResult<()>>,
}

impl StreamHandle {
    /// 编码
    pub fn codec(&self) -> CodecId {
        self.codec
    }

    /// 统计快照
    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// 任务是否已结束
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待任务结束
    pub async fn join(self) -> ScreenResult<()> {
        self.task
            .await
            .map_err(|e| ScreenError::Internal(format!("采集任务异常退出: {}", e)))?
    }
}

/// 启动一个采集任务
///
/// `shutdown` 变为 `true` (或发送端释放) 时任务结束.
pub fn spawn_worker<R>(
    reader: R,
    demuxer: StreamDemuxer,
    arena_capacity: usize,
    tx: mpsc::Sender<MediaUnit>,
    shutdown: watch::Receiver<bool>,
) -> StreamHandle
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let codec = demuxer.codec();
    let stats = Arc::new(WorkerStats::default());
    let reader = FrameReader::new(reader, arena_capacity);
    let task = tokio::spawn(run_worker(reader, demuxer, tx, stats.clone(), shutdown));
    StreamHandle { codec, stats, task }
}

async fn run_worker<R>(
    mut reader: FrameReader<R>,
    demuxer: StreamDemuxer,
    tx: mpsc::Sender<MediaUnit>,
    stats: Arc<WorkerStats>,
    mut shutdown: watch::Receiver<bool>,
) -> ScreenResult<()>
where
    R: AsyncRead + Unpin,
{
    let codec = demuxer.codec();
    let media = codec.media_type();
    info!("{}采集任务启动, 编码: {}", media, codec);

    let result = 'frames: loop {
        if *shutdown.borrow() {
            break Ok(());
        }

        let frame = tokio::select! {
            _ = shutdown.changed() => break 'frames Ok(()),
            frame = reader.read_frame() => frame,
        };
        let (header, payload) = match frame {
            Ok(frame) => frame,
            Err(ScreenError::Eof) => {
                info!("{}连接已关闭", media);
                break Ok(());
            }
            Err(e) => break Err(e),
        };
        stats.record_frame(payload.len(), reader.arena());

        for unit in demuxer.demux(&header, payload) {
            stats.units.fetch_add(1, Ordering::Relaxed);
            match tx.try_send(unit) {
                Ok(()) => {}
                Err(TrySendError::Full(unit)) => {
                    stats.stalls.fetch_add(1, Ordering::Relaxed);
                    warn!("{}输出通道已满, 等待下游消费", media);
                    if tx.send(unit).await.is_err() {
                        break 'frames Err(ScreenError::ChannelClosed);
                    }
                }
                Err(TrySendError::Closed(_)) => break 'frames Err(ScreenError::ChannelClosed),
            }
        }
    };

    match &result {
        Ok(()) => info!("{}采集任务结束", media),
        Err(ScreenError::ChannelClosed) => info!("{}下游已退出, 采集任务结束", media),
        Err(e) => warn!("{}采集任务异常结束: {}", media, e),
    }
    match result {
        Err(ScreenError::ChannelClosed) => Ok(()),
        other => other,
    }
}

/// 采集会话: 一个设备的视频/音频采集任务, 参数集缓存与关键帧请求
pub struct CapturePipeline {
    config: CaptureConfig,
    cache: Arc<ParameterSetCache>,
    keyframes: Arc<KeyframeRequester>,
    meta: MediaMeta,
    shutdown_tx: watch::Sender<bool>,
    video: Option<StreamHandle>,
    audio: Option<StreamHandle>,
}

impl CapturePipeline {
    /// 创建会话, 配置非法时返回错误
    pub fn new(config: CaptureConfig) -> ScreenResult<Self> {
        config.validate()?;
        let cache = Arc::new(ParameterSetCache::new());
        let keyframes = Arc::new(KeyframeRequester::new(
            cache.clone(),
            config.keyframe_cooldown(),
        ));
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            cache,
            keyframes,
            meta: MediaMeta::default(),
            shutdown_tx,
            video: None,
            audio: None,
        })
    }

    /// 配置
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// 参数集缓存
    pub fn cache(&self) -> &Arc<ParameterSetCache> {
        &self.cache
    }

    /// 关键帧请求协调器
    pub fn keyframes(&self) -> Arc<KeyframeRequester> {
        self.keyframes.clone()
    }

    /// 读取媒体连接握手并启动对应的采集任务
    pub async fn attach_stream<R>(
        &mut self,
        mut reader: R,
        first_connection: bool,
    ) -> ScreenResult<(StreamHeader, mpsc::Receiver<MediaUnit>)>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let header = read_stream_header(&mut reader, first_connection).await?;
        if let Some(name) = &header.device_name {
            info!("设备已连接: {}", name);
        }
        self.meta.apply_stream_header(&header);
        let rx = self.start_stream(header.codec, reader)?;
        Ok((header, rx))
    }

    /// 在已完成握手 (或无握手) 的连接上启动采集任务
    pub fn start_stream<R>(
        &mut self,
        codec: CodecId,
        reader: R,
    ) -> ScreenResult<mpsc::Receiver<MediaUnit>>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let media = codec.media_type();
        let (slot, arena_capacity) = match media {
            MediaType::Video => (&mut self.video, self.config.video_arena_capacity),
            MediaType::Audio => (&mut self.audio, self.config.audio_arena_capacity),
        };
        if slot.is_some() {
            return Err(ScreenError::InvalidArgument(format!("{}连接已存在", media)));
        }

        let (tx, rx) = mpsc::channel(self.config.channel_depth);
        if media == MediaType::Video {
            self.keyframes.bind_video(codec, &tx);
        }
        let demuxer = StreamDemuxer::new(codec, self.cache.clone(), self.config.crop_h264);
        *slot = Some(spawn_worker(
            reader,
            demuxer,
            arena_capacity,
            tx,
            self.shutdown_tx.subscribe(),
        ));
        Ok(rx)
    }

    /// 绑定控制连接
    pub async fn attach_control<W>(&self, writer: W)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        self.keyframes.attach_control(writer).await;
    }

    /// 请求关键帧
    pub async fn request_keyframe(&self) -> ScreenResult<KeyframeOutcome> {
        self.keyframes.request_keyframe().await
    }

    /// 媒体元信息 (分辨率以最近一次成功解析的 SPS 为准)
    pub fn media_meta(&self) -> MediaMeta {
        let mut meta = self.meta.clone();
        if let Some(info) = self.cache.geometry() {
            meta.apply_geometry(&info);
        }
        meta
    }

    /// 视频任务统计
    pub fn video_stats(&self) -> Option<PipelineStats> {
        self.video.as_ref().map(StreamHandle::stats)
    }

    /// 音频任务统计
    pub fn audio_stats(&self) -> Option<PipelineStats> {
        self.audio.as_ref().map(StreamHandle::stats)
    }

    /// 通知所有采集任务停止
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// 等待所有采集任务结束, 返回第一个错误
    pub async fn join(mut self) -> ScreenResult<()> {
        let mut first_error = None;
        for handle in [self.video.take(), self.audio.take()].into_iter().flatten() {
            if let Err(e) = handle.join().await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
