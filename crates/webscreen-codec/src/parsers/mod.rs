//! 码流解析器.
//!
//! - [`annexb`]: 起始码扫描与防竞争字节移除
//! - [`h264`]: H.264 NAL 类型与 SPS 解析
//! - [`h265`]: H.265 NAL 类型与 SPS 解析

pub mod annexb;
pub mod h264;
pub mod h265;

/// NAL 单元在解复用中的角色
///
/// H.264 与 H.265 的类型编号不同, 解复用器只关心归类后的角色.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalRole {
    /// 视频参数集 (仅 H.265)
    Vps,
    /// 序列参数集
    Sps,
    /// 图像参数集
    Pps,
    /// 增补增强信息, 不向下游转发
    Sei,
    /// 随机接入点 (IDR/CRA 等)
    Keyframe,
    /// 普通图像切片
    Slice,
    /// 其他非 VCL 单元 (AUD, 填充数据等), 不向下游转发
    Other,
}

impl NalRole {
    /// 是否为参数集
    pub fn is_parameter_set(&self) -> bool {
        matches!(self, Self::Vps | Self::Sps | Self::Pps)
    }
}
