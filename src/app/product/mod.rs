//! 产品管理：列表、新建、编辑、删除和图片上传

pub mod form;
pub mod handler;
pub mod model;
#[cfg(feature = "database")]
pub mod pg;
pub mod repository;
pub mod service;
pub mod view;

pub use handler::AppState;
pub use model::Product;
pub use repository::{InMemoryProductRepository, ProductRepository};
pub use service::ProductService;
