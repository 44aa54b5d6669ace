//! 应用层

pub mod product;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::Config;
use crate::core::{
    middleware::request_logging_middleware, response::see_other, session::session_middleware,
};
use product::{handler, service::INDEX_PATH, AppState};

/// 组装全部路由
///
/// 产品页面挂会话中间件；`/uploads` 直接映射上传目录。
pub fn router(state: AppState, config: &Config) -> Router {
    let product_routes = Router::new()
        .route("/product", get(handler::index))
        .route(
            "/product/new",
            get(handler::new_product).post(handler::new_product),
        )
        .route(
            "/product/edit/:id",
            get(handler::edit_product).post(handler::edit_product),
        )
        .route("/product/delete/:id", post(handler::delete_product))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/", get(|| async { see_other(INDEX_PATH) }))
        .route("/health", get(handler::health_check))
        .merge(product_routes)
        .nest_service("/uploads", ServeDir::new(&config.uploads.directory))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(TimeoutLayer::new(Duration::from_secs(config.http.timeout_seconds)))
                .layer(DefaultBodyLimit::max(config.http.max_body_bytes)),
        )
        .with_state(state)
}
