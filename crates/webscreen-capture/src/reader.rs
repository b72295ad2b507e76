//! 帧读取.
//!
//! 从 scrcpy 媒体连接中依次读出 "帧头 + 负载", 负载直接读入缓冲区切片.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use webscreen_codec::FrameHeader;
use webscreen_codec::frame_header::FRAME_HEADER_SIZE;
use webscreen_core::{ScreenError, ScreenResult};

use crate::arena::ArenaBuffer;

/// 把 `UnexpectedEof` 归为 [`ScreenError::Eof`], 其余保持 I/O 错误
pub(crate) fn map_read_error(err: std::io::Error) -> ScreenError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ScreenError::Eof
    } else {
        ScreenError::Io(err)
    }
}

/// 帧读取器
pub struct FrameReader<R> {
    reader: R,
    arena: ArenaBuffer,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// 创建帧读取器, 负载缓冲区容量为 `arena_capacity`
    pub fn new(reader: R, arena_capacity: usize) -> Self {
        Self {
            reader,
            arena: ArenaBuffer::new(arena_capacity),
        }
    }

    /// 缓冲区 (用于统计)
    pub fn arena(&self) -> &ArenaBuffer {
        &self.arena
    }

    /// 读取下一帧
    ///
    /// 连接关闭 (包括帧中途断开) 返回 [`ScreenError::Eof`].
    pub async fn read_frame(&mut self) -> ScreenResult<(FrameHeader, Bytes)> {
        let mut header_buf = [0u8; FRAME_HEADER_SIZE];
        self.reader
            .read_exact(&mut header_buf)
            .await
            .map_err(map_read_error)?;
        let header = FrameHeader::decode(&header_buf)?;

        let mut payload = self.arena.acquire(header.size as usize);
        self.reader
            .read_exact(&mut payload)
            .await
            .map_err(map_read_error)?;

        Ok((header, payload.freeze()))
    }

    /// 取回底层连接
    pub fn into_inner(self) -> R {
        self.reader
    }
}
