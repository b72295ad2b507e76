//! # webscreen
//!
//! 屏幕投送的媒体采集管线: 从 scrcpy 服务端读取带帧头的码流, 拆成 H.264/H.265
//! NAL 单元, 缓存参数集与最近关键帧, 解析 SPS 恢复显示尺寸, 再按顺序交给下游
//! (WebRTC 发送端等). 大块负载在整个过程中零拷贝传递.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use webscreen::capture::{CaptureConfig, CapturePipeline};
//!
//! # async fn run(conn: tokio::net::TcpStream) -> webscreen::core::ScreenResult<()> {
//! let mut pipeline = CapturePipeline::new(CaptureConfig::default())?;
//! let (header, mut units) = pipeline.attach_stream(conn, true).await?;
//! println!("编码: {}", header.codec);
//! while let Some(unit) = units.recv().await {
//!     println!("{} 字节, 配置={}", unit.size(), unit.is_config);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `webscreen-core` | 错误类型, 比特流读写 |
//! | `webscreen-codec` | 帧头, NAL 拆包, SPS 解析, 参数集缓存 |
//! | `webscreen-capture` | 连接握手, 采集任务, 关键帧请求 |

pub mod logging;

/// 核心类型与工具
pub use webscreen_core as core;

/// 码流解析
pub use webscreen_codec as codec;

/// 采集管线
pub use webscreen_capture as capture;

/// 获取 webscreen 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
