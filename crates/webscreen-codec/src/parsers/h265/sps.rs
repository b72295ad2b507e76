//! H.265/HEVC SPS 解析.
//!
//! 解析到 conformance_window 为止. profile_tier_level 需要完整走完
//! (包括子层), 否则之后的分辨率字段位置会错.

use webscreen_core::bitreader::BitReader;
use webscreen_core::{ScreenError, ScreenResult};

use super::nal::HevcNalUnitType;
use crate::parsers::annexb::remove_emulation_prevention;
use crate::sps_info::SpsInfo;

/// profile_tier_level 中需要的字段
struct ProfileTierLevel {
    tier_flag: bool,
    profile_idc: u8,
    level_idc: u8,
}

/// 解析 HEVC SPS NAL 单元 (含 2 字节 NAL 头, 不含起始码)
///
/// 输出尺寸总是按 conformance window 裁剪.
pub fn parse_hevc_sps(nal: &[u8]) -> ScreenResult<SpsInfo> {
    if nal.len() < 4 {
        return Err(ScreenError::InvalidData("HEVC: SPS 太短".into()));
    }

    let rbsp = remove_emulation_prevention(nal);
    let mut br = BitReader::new(&rbsp);

    // NAL 头
    br.skip_bits(1); // forbidden_zero_bit
    let nal_type = HevcNalUnitType::from_type_id(br.read_bits(6) as u8);
    if nal_type != HevcNalUnitType::Sps {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: 不是 SPS, nal_type={}",
            nal_type
        )));
    }
    br.skip_bits(6); // nuh_layer_id
    br.skip_bits(3); // nuh_temporal_id_plus1

    br.skip_bits(4); // sps_video_parameter_set_id
    let max_sub_layers_minus1 = br.read_bits(3);
    if max_sub_layers_minus1 > 6 {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: sps_max_sub_layers_minus1 超出范围, value={}",
            max_sub_layers_minus1
        )));
    }
    br.skip_bits(1); // sps_temporal_id_nesting_flag

    let ptl = parse_profile_tier_level(&mut br, max_sub_layers_minus1);

    let sps_id = br.read_ue();
    if sps_id > 15 {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: sps_id 超出范围, sps_id={}",
            sps_id
        )));
    }

    let chroma_format_idc = br.read_ue();
    if chroma_format_idc > 3 {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: chroma_format_idc 非法, value={}",
            chroma_format_idc
        )));
    }
    let separate_colour_plane = chroma_format_idc == 3 && br.read_flag();

    let pic_width = u64::from(br.read_ue());
    let pic_height = u64::from(br.read_ue());

    let mut window = [0u64; 4];
    if br.read_flag() {
        for offset in &mut window {
            *offset = u64::from(br.read_ue());
        }
    }

    if br.is_overrun() {
        return Err(ScreenError::InvalidData("HEVC: SPS 数据截断".into()));
    }
    if pic_width == 0 || pic_height == 0 {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: 分辨率非法, {}x{}",
            pic_width, pic_height
        )));
    }

    let chroma_array_type = if separate_colour_plane {
        0
    } else {
        chroma_format_idc
    };
    let (sub_width, sub_height) = match chroma_array_type {
        1 => (2, 2),
        2 => (2, 1),
        _ => (1, 1),
    };
    let crop_x = (window[0] + window[1]) * sub_width;
    let crop_y = (window[2] + window[3]) * sub_height;
    if crop_x >= pic_width || crop_y >= pic_height {
        return Err(ScreenError::InvalidData(format!(
            "HEVC: conformance window 超出图像范围, pic={}x{}, crop={}x{}",
            pic_width, pic_height, crop_x, crop_y
        )));
    }

    let width = u32::try_from(pic_width - crop_x)
        .map_err(|_| ScreenError::InvalidData("HEVC: 宽度溢出".into()))?;
    let height = u32::try_from(pic_height - crop_y)
        .map_err(|_| ScreenError::InvalidData("HEVC: 高度溢出".into()))?;

    Ok(SpsInfo {
        width,
        height,
        profile: ptl.profile_idc,
        level: level_string(ptl.level_idc),
        tier: if ptl.tier_flag { "High" } else { "Main" }.into(),
        chroma_format: chroma_format_idc as u8,
    })
}

/// 解析 profile_tier_level(1, max_sub_layers_minus1)
fn parse_profile_tier_level(
    br: &mut BitReader<'_>,
    max_sub_layers_minus1: u32,
) -> ProfileTierLevel {
    br.skip_bits(2); // general_profile_space
    let tier_flag = br.read_flag();
    let profile_idc = br.read_bits(5) as u8;
    br.skip_bits(32); // general_profile_compatibility_flags
    br.skip_bits(48); // progressive/interlaced/non_packed/frame_only + 43 位保留 + inbld
    let level_idc = br.read_bits(8) as u8;

    let mut sub_layer_profile_present = [false; 8];
    let mut sub_layer_level_present = [false; 8];
    for i in 0..max_sub_layers_minus1 as usize {
        sub_layer_profile_present[i] = br.read_flag();
        sub_layer_level_present[i] = br.read_flag();
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1..8 {
            br.skip_bits(2); // reserved_zero_2bits
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if sub_layer_profile_present[i] {
            br.skip_bits(88);
        }
        if sub_layer_level_present[i] {
            br.skip_bits(8);
        }
    }

    ProfileTierLevel {
        tier_flag,
        profile_idc,
        level_idc,
    }
}

/// general_level_idc (级别 × 30) → 级别字符串, 如 93 → "3.1", 120 → "4.0"
fn level_string(level_idc: u8) -> String {
    format!("{}.{}", level_idc / 30, (level_idc % 30) / 3)
}
