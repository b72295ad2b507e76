//! SPS 解析结果.

use serde::Serialize;

/// 从 SPS 中恢复的显示几何与档次信息
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SpsInfo {
    /// 显示宽度 (像素, 已按需裁剪)
    pub width: u32,
    /// 显示高度 (像素, 已按需裁剪)
    pub height: u32,
    /// profile_idc
    pub profile: u8,
    /// 级别, 如 "3.1", "4.0"
    pub level: String,
    /// 层级 ("Main"/"High"), H.264 为空
    pub tier: String,
    /// chroma_format_idc (0=单色, 1=4:2:0, 2=4:2:2, 3=4:4:4)
    pub chroma_format: u8,
}

impl SpsInfo {
    /// 分辨率描述, 如 "1920x1080"
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}
