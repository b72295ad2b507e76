//! H.265/HEVC 码流解析.

pub mod nal;
pub mod sps;

pub use nal::HevcNalUnitType;
pub use sps::parse_hevc_sps;
