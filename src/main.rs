use anyhow::Context;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use product_admin::{
    app::{
        self,
        product::{
            form::product_form, AppState, InMemoryProductRepository, ProductRepository,
            ProductService,
        },
    },
    config::{load_config, Config},
    core::session::SessionStore,
    logging::init_logging,
    upload::LocalFileStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    let _guard = init_logging(&config.logging)?;

    info!("启动产品管理服务 v{}", env!("CARGO_PKG_VERSION"));

    let repository = build_repository(&config).await?;
    let files = Arc::new(LocalFileStore::new(config.uploads.directory.clone()));
    let product_service = ProductService::new(repository, files, product_form(&config.uploads));
    let state = AppState::new(product_service, SessionStore::new(&config.session));

    let app = app::router(state, &config);

    let addr = config.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("无法绑定到 {}", addr))?;

    info!("🚀 服务器运行在 http://{}", addr);
    info!("📖 可用的路由:");
    info!("   GET       /product             - 产品列表");
    info!("   GET|POST  /product/new         - 新建产品");
    info!("   GET|POST  /product/edit/:id    - 编辑产品");
    info!("   POST      /product/delete/:id  - 删除产品");
    info!("   GET       /uploads/*           - 上传的图片");
    info!("   GET       /health              - 健康检查");
    info!("上传目录: {}", config.uploads.directory.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("服务器运行失败")?;

    info!("服务器已停止");
    Ok(())
}

/// 配置了数据库连接串时使用 PostgreSQL，否则使用内存存储
#[cfg(feature = "database")]
async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn ProductRepository>> {
    use product_admin::app::product::pg::PgProductRepository;

    match config.database.url.as_deref() {
        Some(url) => {
            let repository = PgProductRepository::connect(url, &config.database)
                .await
                .context("数据库连接失败")?;
            Ok(Arc::new(repository))
        }
        None => {
            warn!("未配置数据库，使用内存存储，重启后数据会丢失");
            Ok(Arc::new(InMemoryProductRepository::new()))
        }
    }
}

#[cfg(not(feature = "database"))]
async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn ProductRepository>> {
    if config.database.url.is_some() {
        warn!("未启用 database 特性，忽略数据库配置");
    }
    warn!("使用内存存储，重启后数据会丢失");
    Ok(Arc::new(InMemoryProductRepository::new()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    info!("收到退出信号，正在关闭...");
}
