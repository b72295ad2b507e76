//! H.264 SPS (Sequence Parameter Set) 解析.
//!
//! 只解析到 frame_cropping 为止, 用于恢复显示分辨率与 profile/level.
//! VUI 及之后的字段不读取.

use webscreen_core::bitreader::BitReader;
use webscreen_core::{ScreenError, ScreenResult};

use super::nal::NalUnitType;
use crate::parsers::annexb::remove_emulation_prevention;
use crate::sps_info::SpsInfo;

/// 解析 H.264 SPS NAL 单元 (含 1 字节 NAL 头, 不含起始码)
///
/// `apply_cropping` 为 `true` 时按 frame_cropping 裁剪输出尺寸,
/// 否则返回宏块对齐的编码尺寸.
pub fn parse_sps(nal: &[u8], apply_cropping: bool) -> ScreenResult<SpsInfo> {
    if nal.len() < 4 {
        return Err(ScreenError::InvalidData("H.264: SPS 太短".into()));
    }
    let nal_type = NalUnitType::from_header(nal[0]);
    if nal_type != NalUnitType::Sps {
        return Err(ScreenError::InvalidData(format!(
            "H.264: 不是 SPS, nal_type={}",
            nal_type
        )));
    }

    let rbsp = remove_emulation_prevention(&nal[1..]);
    let mut br = BitReader::new(&rbsp);

    let profile_idc = br.read_bits(8) as u8;
    br.skip_bits(8); // constraint_set0..5_flag + reserved_zero_2bits
    let level_idc = br.read_bits(8) as u8;

    let sps_id = br.read_ue();
    if sps_id > 31 {
        return Err(ScreenError::InvalidData(format!(
            "H.264: sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }

    let mut chroma_format_idc = 1; // 默认 4:2:0
    let mut separate_colour_plane = false;
    if is_high_profile(profile_idc) {
        chroma_format_idc = br.read_ue();
        if chroma_format_idc > 3 {
            return Err(ScreenError::InvalidData(format!(
                "H.264: chroma_format_idc 非法, value={}",
                chroma_format_idc
            )));
        }
        if chroma_format_idc == 3 {
            separate_colour_plane = br.read_flag();
        }
        br.read_ue(); // bit_depth_luma_minus8
        br.read_ue(); // bit_depth_chroma_minus8
        br.skip_bits(1); // qpprime_y_zero_transform_bypass_flag

        if br.read_flag() {
            let list_count = if chroma_format_idc == 3 { 12 } else { 8 };
            for i in 0..list_count {
                if br.read_flag() {
                    skip_scaling_list(&mut br, if i < 6 { 16 } else { 64 });
                }
            }
        }
    }

    let log2_max_frame_num_minus4 = br.read_ue();
    if log2_max_frame_num_minus4 > 12 {
        return Err(ScreenError::InvalidData(format!(
            "H.264: log2_max_frame_num_minus4 超出范围, value={}",
            log2_max_frame_num_minus4
        )));
    }

    let poc_type = br.read_ue();
    match poc_type {
        0 => {
            let log2_max_poc_lsb_minus4 = br.read_ue();
            if log2_max_poc_lsb_minus4 > 12 {
                return Err(ScreenError::InvalidData(format!(
                    "H.264: log2_max_pic_order_cnt_lsb_minus4 超出范围, value={}",
                    log2_max_poc_lsb_minus4
                )));
            }
        }
        1 => {
            br.skip_bits(1); // delta_pic_order_always_zero_flag
            br.read_se(); // offset_for_non_ref_pic
            br.read_se(); // offset_for_top_to_bottom_field
            let num_ref_in_cycle = br.read_ue();
            if num_ref_in_cycle > 255 {
                return Err(ScreenError::InvalidData(format!(
                    "H.264: num_ref_frames_in_pic_order_cnt_cycle 超出范围, value={}",
                    num_ref_in_cycle
                )));
            }
            for _ in 0..num_ref_in_cycle {
                br.read_se();
            }
        }
        2 => {}
        _ => {
            return Err(ScreenError::InvalidData(format!(
                "H.264: pic_order_cnt_type 非法, value={}",
                poc_type
            )));
        }
    }

    br.read_ue(); // max_num_ref_frames
    br.skip_bits(1); // gaps_in_frame_num_value_allowed_flag

    let width_in_mbs = u64::from(br.read_ue()) + 1;
    let height_in_map_units = u64::from(br.read_ue()) + 1;
    let frame_mbs_only = br.read_flag();
    if !frame_mbs_only {
        br.skip_bits(1); // mb_adaptive_frame_field_flag
    }
    br.skip_bits(1); // direct_8x8_inference_flag

    let frame_cropping = br.read_flag();
    let mut crop = [0u64; 4];
    if apply_cropping && frame_cropping {
        for offset in &mut crop {
            *offset = u64::from(br.read_ue());
        }
    }

    if br.is_overrun() {
        return Err(ScreenError::InvalidData("H.264: SPS 数据截断".into()));
    }

    let height_mult = if frame_mbs_only { 1 } else { 2 };
    let coded_width = width_in_mbs * 16;
    let coded_height = height_in_map_units * 16 * height_mult;

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (crop_unit_x, crop_unit_y) = cropping_unit(chroma_array_type, frame_mbs_only);
    let crop_x = (crop[0] + crop[1]) * crop_unit_x;
    let crop_y = (crop[2] + crop[3]) * crop_unit_y;
    if crop_x >= coded_width || crop_y >= coded_height {
        return Err(ScreenError::InvalidData(format!(
            "H.264: 裁剪超出图像范围, coded={}x{}, crop={}x{}",
            coded_width, coded_height, crop_x, crop_y
        )));
    }

    let width = u32::try_from(coded_width - crop_x)
        .map_err(|_| ScreenError::InvalidData("H.264: 宽度溢出".into()))?;
    let height = u32::try_from(coded_height - crop_y)
        .map_err(|_| ScreenError::InvalidData("H.264: 高度溢出".into()))?;

    Ok(SpsInfo {
        width,
        height,
        profile: profile_idc,
        level: level_string(level_idc),
        tier: String::new(),
        chroma_format: chroma_format_idc as u8,
    })
}

// ============================================================
// 辅助函数
// ============================================================

/// 是否为 High Profile 或更高 (SPS 中带 chroma_format_idc 等扩展字段)
fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134
    )
}

/// 获取 cropping 单位 (亮度像素)
fn cropping_unit(chroma_array_type: u32, frame_mbs_only: bool) -> (u64, u64) {
    let sub_width = match chroma_array_type {
        0 | 3 => 1,
        _ => 2, // 4:2:0 和 4:2:2
    };
    let sub_height = match chroma_array_type {
        0 | 2 | 3 => 1,
        _ => 2, // 4:2:0
    };
    let height_mult = if frame_mbs_only { 1 } else { 2 };

    (sub_width, sub_height * height_mult)
}

/// 跳过一个 scaling_list, 只消费 delta_scale
fn skip_scaling_list(br: &mut BitReader<'_>, size: usize) {
    let mut last_scale = 8i64;
    let mut next_scale = 8i64;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = i64::from(br.read_se());
            next_scale = (last_scale + delta_scale + 256).rem_euclid(256);
        }
        if next_scale != 0 {
            last_scale = next_scale;
        }
    }
}

/// level_idc → 级别字符串, 如 31 → "3.1", 40 → "4"
fn level_string(level_idc: u8) -> String {
    if level_idc == 9 {
        return "1b".into();
    }
    let (major, minor) = (level_idc / 10, level_idc % 10);
    if minor == 0 {
        major.to_string()
    } else {
        format!("{}.{}", major, minor)
    }
}
