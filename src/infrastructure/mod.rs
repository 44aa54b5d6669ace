//! 基础设施层

#[cfg(feature = "database")]
pub mod database;
