//! 参数集与关键帧缓存.
//!
//! 缓存最近一次在视频连接上看到的 VPS/SPS/PPS 与 IDR, 以及由 SPS 解析出的
//! 显示几何信息. 写入与读出都是深拷贝: 缓存内容从不与采集缓冲区共享内存,
//! 读出的副本也与缓存互相独立.
//!
//! 读写锁只在拷入/拷出期间持有, 不会跨越任何 I/O.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::media_unit::MediaUnit;
use crate::sps_info::SpsInfo;

/// 缓存内部状态
#[derive(Debug, Default)]
struct CacheState {
    vps: Option<Bytes>,
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    last_idr: Option<Bytes>,
    last_idr_time: Option<Instant>,
    geometry: Option<SpsInfo>,
    last_pts: Duration,
}

/// 当前参数集的独立副本
#[derive(Debug, Clone, Default)]
pub struct ParameterSets {
    /// VPS (仅 H.265)
    pub vps: Option<Bytes>,
    /// SPS
    pub sps: Option<Bytes>,
    /// PPS
    pub pps: Option<Bytes>,
}

impl ParameterSets {
    /// 按 VPS → SPS → PPS 顺序迭代已存在的参数集
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        [&self.vps, &self.sps, &self.pps].into_iter().flatten()
    }
}

/// 重发关键帧所需的完整数据
#[derive(Debug, Clone)]
pub struct KeyframeSet {
    /// VPS (H.265 必有, H.264 为 None)
    pub vps: Option<Bytes>,
    /// SPS
    pub sps: Bytes,
    /// PPS
    pub pps: Bytes,
    /// 最近的 IDR
    pub idr: Bytes,
    /// 重发时使用的时间戳 (最近一帧视频的 PTS)
    pub pts: Duration,
}

impl KeyframeSet {
    /// 转为按 [VPS, SPS, PPS, IDR] 排列的媒体单元
    pub fn into_units(self) -> Vec<MediaUnit> {
        let pts = self.pts;
        let mut units = Vec::with_capacity(4);
        if let Some(vps) = self.vps {
            units.push(MediaUnit::config(vps, pts));
        }
        units.push(MediaUnit::config(self.sps, pts));
        units.push(MediaUnit::config(self.pps, pts));
        units.push(MediaUnit::media(self.idr, pts, true));
        units
    }
}

/// 参数集与关键帧缓存
#[derive(Debug, Default)]
pub struct ParameterSetCache {
    state: RwLock<CacheState>,
}

fn deep_copy(data: &Option<Bytes>) -> Option<Bytes> {
    data.as_deref().map(Bytes::copy_from_slice)
}

impl ParameterSetCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 缓存 VPS
    pub fn update_vps(&self, nal: &[u8]) {
        let copy = Bytes::copy_from_slice(nal);
        self.write().vps = Some(copy);
    }

    /// 缓存 PPS
    pub fn update_pps(&self, nal: &[u8]) {
        let copy = Bytes::copy_from_slice(nal);
        self.write().pps = Some(copy);
    }

    /// SPS 是否与缓存中的不同 (缓存为空也算不同)
    pub fn sps_changed(&self, nal: &[u8]) -> bool {
        self.read().sps.as_deref() != Some(nal)
    }

    /// 缓存 SPS
    ///
    /// `geometry` 为 `None` 表示 SPS 解析失败, 此时保留原有几何信息.
    pub fn update_sps(&self, nal: &[u8], geometry: Option<SpsInfo>) {
        let copy = Bytes::copy_from_slice(nal);
        let mut state = self.write();
        state.sps = Some(copy);
        if geometry.is_some() {
            state.geometry = geometry;
        }
    }

    /// 缓存 IDR, 并记录缓存时间
    pub fn update_idr(&self, nal: &[u8]) {
        let copy = Bytes::copy_from_slice(nal);
        let mut state = self.write();
        state.last_idr = Some(copy);
        state.last_idr_time = Some(Instant::now());
    }

    /// 记录最近一帧视频的 PTS
    pub fn set_last_pts(&self, pts: Duration) {
        self.write().last_pts = pts;
    }

    /// 最近一帧视频的 PTS
    pub fn last_pts(&self) -> Duration {
        self.read().last_pts
    }

    /// VPS 副本
    pub fn vps(&self) -> Option<Bytes> {
        deep_copy(&self.read().vps)
    }

    /// SPS 副本
    pub fn sps(&self) -> Option<Bytes> {
        deep_copy(&self.read().sps)
    }

    /// PPS 副本
    pub fn pps(&self) -> Option<Bytes> {
        deep_copy(&self.read().pps)
    }

    /// 最近 IDR 的副本
    pub fn last_idr(&self) -> Option<Bytes> {
        deep_copy(&self.read().last_idr)
    }

    /// 最近 IDR 的缓存时间
    pub fn last_idr_time(&self) -> Option<Instant> {
        self.read().last_idr_time
    }

    /// 当前显示几何信息
    pub fn geometry(&self) -> Option<SpsInfo> {
        self.read().geometry.clone()
    }

    /// 一次性取出全部参数集的副本
    pub fn parameter_sets(&self) -> ParameterSets {
        let state = self.read();
        ParameterSets {
            vps: deep_copy(&state.vps),
            sps: deep_copy(&state.sps),
            pps: deep_copy(&state.pps),
        }
    }

    /// 取出完整的关键帧重发数据
    ///
    /// 缺少 SPS/PPS/IDR 中任意一项 (或 `require_vps` 时缺少 VPS) 返回 `None`.
    pub fn keyframe_set(&self, require_vps: bool) -> Option<KeyframeSet> {
        let state = self.read();
        if require_vps && state.vps.is_none() {
            return None;
        }
        Some(KeyframeSet {
            vps: deep_copy(&state.vps),
            sps: deep_copy(&state.sps)?,
            pps: deep_copy(&state.pps)?,
            idr: deep_copy(&state.last_idr)?,
            pts: state.last_pts,
        })
    }

    /// 清空缓存 (重新连接设备时使用)
    pub fn clear(&self) {
        *self.write() = CacheState::default();
    }
}
