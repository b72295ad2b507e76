//! 统一错误类型定义.
//!
//! 所有 webscreen crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误按来源分为几类:
//! - 传输错误 ([`ScreenError::Io`], [`ScreenError::Eof`]): 对所在采集任务是致命的
//! - 协议/解析错误 ([`ScreenError::InvalidData`]): 在本地恢复, 不中断管线
//! - 通道错误 ([`ScreenError::ChannelClosed`]): 下游消费者已退出

use thiserror::Error;

/// webscreen 统一错误类型
#[derive(Debug, Error)]
pub enum ScreenError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 无效数据 (损坏或截断的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 不支持的编码或操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾 (对端关闭连接)
    #[error("已到达流末尾")]
    Eof,

    /// 输出通道已关闭
    #[error("输出通道已关闭")]
    ChannelClosed,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl ScreenError {
    /// 是否为传输层错误 (连接断开, 短读等)
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Eof)
    }
}

/// webscreen 统一 Result 类型
pub type ScreenResult<T> = Result<T, ScreenError>;
