//! 请求上下文
//!
//! 每个请求持有一份会话快照（CSRF 密钥和待显示的提示消息），由会话中间件创建，
//! 以参数形式显式传给控制器，处理结束后再写回会话存储。

use serde::{Deserialize, Serialize};
use std::fmt;

use super::csrf::{self, CsrfSecret};

/// 提示消息级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
        }
    }
}

impl fmt::Display for FlashLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条提示消息，在下一次渲染页面时显示
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// 请求上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    session_id: String,
    csrf_secret: CsrfSecret,
    flashes: Vec<Flash>,
    /// 加载时会话中已有的提示消息
    loaded: Vec<Flash>,
    /// 本次请求是否取走过提示消息
    consumed: bool,
}

impl RequestContext {
    pub fn new(
        session_id: impl Into<String>,
        csrf_secret: CsrfSecret,
        flashes: Vec<Flash>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            csrf_secret,
            loaded: flashes.clone(),
            flashes,
            consumed: false,
        }
    }

    /// 新会话的上下文，主要用于测试
    pub fn fresh() -> Self {
        Self::new(
            uuid::Uuid::new_v4().simple().to_string(),
            csrf::generate_secret(),
            Vec::new(),
        )
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn csrf_secret(&self) -> &CsrfSecret {
        &self.csrf_secret
    }

    /// 追加一条提示消息
    pub fn add_flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }

    /// 查看待显示的提示消息，不消费
    pub fn flashes(&self) -> &[Flash] {
        &self.flashes
    }

    /// 取出全部提示消息，渲染页面时调用
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        self.consumed = true;
        std::mem::take(&mut self.flashes)
    }

    /// 本次请求对提示消息的改动：(取走的已有消息, 新增且未取走的消息)
    ///
    /// 写回会话时按改动合并，同一会话的并发请求不会互相覆盖。
    pub(crate) fn flash_changes(&self) -> (&[Flash], &[Flash]) {
        if self.consumed {
            (self.loaded.as_slice(), self.flashes.as_slice())
        } else {
            (&[], &self.flashes[self.loaded.len()..])
        }
    }

    /// 当前会话下指定 ID 的 CSRF 令牌
    pub fn csrf_token(&self, token_id: &str) -> String {
        csrf::token_for(&self.csrf_secret, token_id)
    }

    pub fn is_csrf_token_valid(&self, token_id: &str, submitted: Option<&str>) -> bool {
        csrf::is_token_valid(&self.csrf_secret, token_id, submitted)
    }
}
