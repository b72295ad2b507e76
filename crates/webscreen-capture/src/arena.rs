//! 采集缓冲区 (arena).
//!
//! 一块预分配的连续内存, 按帧切出互不重叠的负载切片. 剩余空间不足时整块换新,
//! 旧分配在最后一个切片释放后自动回收 (引用计数), 已发往下游的切片始终有效.
//! 超过整块容量的帧单独分配一次.

use bytes::BytesMut;
use log::debug;

/// 视频缓冲区默认容量 (8 MiB)
pub const DEFAULT_VIDEO_ARENA_CAPACITY: usize = 8 * 1024 * 1024;

/// 音频缓冲区默认容量 (1 MiB)
pub const DEFAULT_AUDIO_ARENA_CAPACITY: usize = 1024 * 1024;

/// 采集缓冲区
///
/// 每个缓冲区只属于一个采集任务.
#[derive(Debug)]
pub struct ArenaBuffer {
    /// 当前分配中尚未切出的部分
    buf: BytesMut,
    /// 每块分配的容量
    capacity: usize,
    /// 换新次数
    rotations: u64,
    /// 超大帧单独分配次数
    oversized: u64,
}

impl ArenaBuffer {
    /// 预分配 `capacity` 字节
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            rotations: 0,
            oversized: 0,
        }
    }

    /// 每块分配的容量
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前分配剩余可切出的字节数
    pub fn remaining(&self) -> usize {
        self.buf.capacity()
    }

    /// 换新次数
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// 超大帧单独分配次数
    pub fn oversized_allocations(&self) -> u64 {
        self.oversized
    }

    /// 切出 `len` 字节的独占切片 (内容为 0)
    ///
    /// 调用方读满后用 [`BytesMut::freeze`] 转为共享的 `Bytes`.
    pub fn acquire(&mut self, len: usize) -> BytesMut {
        if len > self.capacity {
            self.oversized += 1;
            debug!("帧大小 {} 超过缓冲区容量 {}, 单独分配", len, self.capacity);
            return BytesMut::zeroed(len);
        }

        if self.buf.capacity() < len {
            // 整块换新, 不在原地扩容
            self.buf = BytesMut::with_capacity(self.capacity);
            self.rotations += 1;
            debug!("缓冲区换新, 第 {} 次", self.rotations);
        }

        self.buf.resize(len, 0);
        self.buf.split_to(len)
    }
}
