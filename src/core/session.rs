//! 会话存储与会话中间件
//!
//! 会话保存在内存中，以 cookie 中的会话 ID 为键。中间件在请求开始时把会话加载成
//! [`RequestContext`]，处理结束后写回，新会话会在响应中下发 cookie。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::context::{Flash, RequestContext};
use super::csrf::{self, CsrfSecret};
use crate::config::SessionConfig;

/// 单个会话
struct SessionEntry {
    csrf_secret: CsrfSecret,
    flashes: Vec<Flash>,
    expires_at: Instant,
}

/// 内存会话存储
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
    ttl: Duration,
    cookie_name: Arc<str>,
    secure: bool,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::from_secs(config.ttl_seconds),
            cookie_name: Arc::from(config.cookie_name.as_str()),
            secure: config.secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// 加载会话，不存在或已过期时新建。返回值的第二项表示是否为新会话。
    pub async fn load(&self, session_id: Option<&str>) -> (RequestContext, bool) {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        sessions.retain(|_, entry| entry.expires_at > now);

        if let Some(id) = session_id {
            if let Some(entry) = sessions.get(id) {
                let ctx = RequestContext::new(id, entry.csrf_secret, entry.flashes.clone());
                return (ctx, false);
            }
        }

        let id = Uuid::new_v4().simple().to_string();
        let secret = csrf::generate_secret();
        sessions.insert(
            id.clone(),
            SessionEntry {
                csrf_secret: secret,
                flashes: Vec::new(),
                expires_at: now + self.ttl,
            },
        );
        debug!(session_id = %id, "session created");
        (RequestContext::new(id, secret, Vec::new()), true)
    }

    /// 写回会话并延长有效期
    ///
    /// 只应用本次请求的改动：去掉已取走的消息，追加新增的消息。
    pub async fn save(&self, ctx: &RequestContext) {
        let mut sessions = self.sessions.lock().await;
        let expires_at = Instant::now() + self.ttl;
        let entry = sessions
            .entry(ctx.session_id().to_string())
            .or_insert_with(|| SessionEntry {
                csrf_secret: *ctx.csrf_secret(),
                flashes: Vec::new(),
                expires_at,
            });

        let (taken, added) = ctx.flash_changes();
        for flash in taken {
            if let Some(pos) = entry.flashes.iter().position(|f| f == flash) {
                entry.flashes.remove(pos);
            }
        }
        entry.flashes.extend_from_slice(added);
        entry.expires_at = expires_at;
    }

    /// 当前有效会话数
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        Cookie::build((self.cookie_name.to_string(), session_id.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

/// 挂在请求扩展上的上下文句柄
#[derive(Clone)]
pub struct SessionHandle(Arc<Mutex<RequestContext>>);

impl SessionHandle {
    pub fn new(ctx: RequestContext) -> Self {
        Self(Arc::new(Mutex::new(ctx)))
    }

    pub async fn lock(&self) -> MutexGuard<'_, RequestContext> {
        self.0.lock().await
    }
}

/// 会话中间件
pub async fn session_middleware(
    State(store): State<SessionStore>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_id = jar.get(store.cookie_name()).map(|c| c.value().to_string());
    let (ctx, is_new) = store.load(cookie_id.as_deref()).await;
    let session_id = ctx.session_id().to_string();

    let handle = SessionHandle::new(ctx);
    req.extensions_mut().insert(handle.clone());

    let response = next.run(req).await;

    store.save(&*handle.lock().await).await;

    if is_new {
        (jar.add(store.session_cookie(&session_id)), response).into_response()
    } else {
        response
    }
}
