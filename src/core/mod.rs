//! 核心层：错误、中间件、会话与响应

pub mod context;
pub mod csrf;
pub mod error;
pub mod middleware;
pub mod response;
pub mod session;
