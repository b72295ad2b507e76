//! # webscreen-capture
//!
//! scrcpy 采集管线: 连接握手, 帧读取, 解复用任务与关键帧请求.
//!
//! 典型流程:
//! 1. [`CapturePipeline::attach_stream`] 依次接入视频, 音频连接 (读取握手并启动任务)
//! 2. [`CapturePipeline::attach_control`] 接入控制连接
//! 3. 从返回的通道中读取 [`MediaUnit`](webscreen_codec::MediaUnit)
//! 4. 需要关键帧时调用 [`CapturePipeline::request_keyframe`]

pub mod arena;
pub mod config;
pub mod handshake;
pub mod keyframe;
pub mod pipeline;
pub mod reader;

pub use arena::ArenaBuffer;
pub use config::CaptureConfig;
pub use handshake::{MediaMeta, StreamHeader};
pub use keyframe::{KeyframeOutcome, KeyframeRequester, TYPE_REQUEST_IDR};
pub use pipeline::{CapturePipeline, PipelineStats, StreamHandle, spawn_worker};
pub use reader::FrameReader;
pub use webscreen_codec::FrameHeader;
