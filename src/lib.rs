//! # 产品管理后台
//!
//! 基于 Axum 的产品增删改查页面，包括：
//! - 表单绑定与校验（[`form`]）
//! - 图片上传与落盘（[`upload`]）
//! - 会话、提示消息与 CSRF 令牌（[`core`]）
//! - 内存或 PostgreSQL 存储（[`app::product`]）

pub mod app;
pub mod config;
pub mod core;
pub mod form;
pub mod infrastructure;
pub mod logging;
pub mod upload;

pub use app::router;
pub use config::{load_config, Config};
