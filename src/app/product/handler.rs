//! 产品处理器

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Json, Response},
    Extension,
};

use super::{
    service::{Outcome, ProductService},
    view,
};
use crate::core::{
    context::RequestContext,
    error::CoreError,
    response::{page, see_other, ApiResponse},
    session::{SessionHandle, SessionStore},
};
use crate::form::RawInput;

#[derive(Clone)]
pub struct AppState {
    pub product_service: ProductService,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(product_service: ProductService, sessions: SessionStore) -> Self {
        Self {
            product_service,
            sessions,
        }
    }
}

/// GET /product
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Response, CoreError> {
    let mut ctx = session.lock().await;
    let outcome = state.product_service.list(&mut ctx).await?;
    Ok(render(&mut ctx, outcome))
}

/// GET|POST /product/new
pub async fn new_product(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    input: RawInput,
) -> Result<Response, CoreError> {
    let mut ctx = session.lock().await;
    let outcome = state.product_service.create(&mut ctx, input).await?;
    Ok(render(&mut ctx, outcome))
}

/// GET|POST /product/edit/:id
pub async fn edit_product(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<i64>,
    input: RawInput,
) -> Result<Response, CoreError> {
    let mut ctx = session.lock().await;
    let outcome = state.product_service.edit(&mut ctx, id, input).await?;
    Ok(render(&mut ctx, outcome))
}

/// POST /product/delete/:id
pub async fn delete_product(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Path(id): Path<i64>,
    input: RawInput,
) -> Result<Response, CoreError> {
    let mut ctx = session.lock().await;
    let outcome = state.product_service.delete(&mut ctx, id, input).await?;
    Ok(render(&mut ctx, outcome))
}

/// GET /health
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, CoreError> {
    let products = state.product_service.repository().find_all().await?.len();
    Ok(Json(ApiResponse::success(serde_json::json!({
        "status": "healthy",
        "products": products,
        "sessions": state.sessions.len().await,
        "version": env!("CARGO_PKG_VERSION"),
    }))))
}

/// 渲染页面时取出待显示的提示消息；重定向时保留到下一个页面
fn render(ctx: &mut RequestContext, outcome: Outcome) -> Response {
    match outcome {
        Outcome::Redirect(location) => see_other(location),
        Outcome::Index(products) => {
            let flashes = ctx.take_flashes();
            page(StatusCode::OK, view::index_page(ctx, &products, &flashes))
        }
        Outcome::Form(form) => {
            let status = if form.form.submitted {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::OK
            };
            let flashes = ctx.take_flashes();
            page(status, view::form_page(ctx, &form, &flashes))
        }
    }
}
