//! # webscreen-core
//!
//! webscreen 核心库, 提供错误类型、比特流读写等底层基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod media_type;

// 重导出常用类型
pub use error::{ScreenError, ScreenResult};
pub use media_type::MediaType;
