//! # webscreen-codec
//!
//! webscreen 码流解析库, 负责把 scrcpy 推送的帧拆成可直接交给下游的媒体单元.
//!
//! ## 模块
//!
//! - [`frame_header`]: 12 字节帧头编解码
//! - [`parsers`]: Annex B 起始码扫描, H.264/H.265 NAL 类型与 SPS 解析
//! - [`param_cache`]: 参数集 (VPS/SPS/PPS) 与最近关键帧缓存
//! - [`demux`]: 视频/音频解复用器
//!
//! ## 使用示例
//!
//! ```rust
//! use std::sync::Arc;
//! use bytes::Bytes;
//! use webscreen_codec::{CodecId, FrameHeader, ParameterSetCache, StreamDemuxer};
//!
//! let cache = Arc::new(ParameterSetCache::new());
//! let demuxer = StreamDemuxer::new(CodecId::H264, cache, true);
//!
//! let header = FrameHeader::media(0, false, 5);
//! let payload = Bytes::from_static(&[0, 0, 0, 1, 0x41]);
//! let units: Vec<_> = demuxer.demux(&header, payload).collect();
//! assert_eq!(units.len(), 1);
//! assert_eq!(&units[0].data[..], &[0x41]);
//! ```

pub mod codec_id;
pub mod demux;
pub mod frame_header;
pub mod media_unit;
pub mod param_cache;
pub mod parsers;
pub mod sps_info;

// 重导出常用类型
pub use codec_id::CodecId;
pub use demux::{AudioDemuxer, DemuxUnits, OpusHead, StreamDemuxer, VideoDemuxer};
pub use frame_header::FrameHeader;
pub use media_unit::MediaUnit;
pub use param_cache::{KeyframeSet, ParameterSetCache};
pub use sps_info::SpsInfo;
