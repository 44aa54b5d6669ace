//! 产品数据模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 产品实体
///
/// `id` 在持久化之前为空；`image` 保存的是上传目录下的文件名。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Option<i64>,
    pub name: String,
    pub price: f64,
    pub description: Option<String>,
    pub image: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// 价格的显示形式：能无损表示时保留两位小数，否则原样输出，
    /// 保证编辑时原样提交不会改变存储的值
    pub fn price_text(&self) -> String {
        let fixed = format!("{:.2}", self.price);
        if fixed.parse::<f64>() == Ok(self.price) {
            fixed
        } else {
            self.price.to_string()
        }
    }
}
