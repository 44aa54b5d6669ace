//! CSRF 令牌
//!
//! 令牌由会话密钥和令牌 ID 派生：`hex(sha256(secret ‖ ":" ‖ id))`。
//! 同一会话内不同 ID 的令牌互不通用，例如 `delete5` 的令牌不能用于 `delete6`。

use sha2::{Digest, Sha256};

/// 会话密钥长度
pub const SECRET_LEN: usize = 32;

/// 会话级 CSRF 密钥
pub type CsrfSecret = [u8; SECRET_LEN];

/// 生成新的随机会话密钥
pub fn generate_secret() -> CsrfSecret {
    rand::random::<CsrfSecret>()
}

/// 计算指定 ID 的令牌
pub fn token_for(secret: &CsrfSecret, token_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(b":");
    hasher.update(token_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// 校验提交的令牌，缺失即无效
pub fn is_token_valid(secret: &CsrfSecret, token_id: &str, submitted: Option<&str>) -> bool {
    match submitted {
        Some(value) if !value.is_empty() => {
            constant_time_eq(token_for(secret, token_id).as_bytes(), value.as_bytes())
        }
        _ => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
