//! H.264/AVC 码流解析.
//!
//! - NAL 单元类型识别
//! - SPS 解析 (分辨率, profile, level)

pub mod nal;
pub mod sps;

pub use nal::NalUnitType;
pub use sps::parse_sps;
