//! 产品表单定义

use super::model::Product;
use crate::config::UploadConfig;
use crate::form::{Field, FieldValue, FormSchema, Rule};

/// 表单名，字段以 `product[...]` 形式提交
pub const FORM_NAME: &str = "product";
/// 图片上传字段
pub const IMAGE_FIELD: &str = "image";

pub const NAME_MAX_LENGTH: u64 = 255;
pub const DESCRIPTION_MAX_LENGTH: u64 = 2000;
pub const PRICE_MAX: f64 = 1_000_000.0;

/// 产品表单：名称、价格、描述、图片
pub fn product_form(uploads: &UploadConfig) -> FormSchema<Product> {
    FormSchema::builder(FORM_NAME)
        .field(
            Field::text("name")
                .label("Name")
                .required()
                .rule(Rule::Length {
                    min: Some(2),
                    max: Some(NAME_MAX_LENGTH),
                })
                .map(
                    |p: &Product| Some(p.name.clone()),
                    |p, v| p.name = v.and_then(FieldValue::into_text).unwrap_or_default(),
                ),
        )
        .field(
            Field::decimal("price")
                .label("Price")
                .required()
                .rule(Rule::Range {
                    min: Some(0.0),
                    max: Some(PRICE_MAX),
                })
                .map(
                    |p: &Product| Some(p.price_text()),
                    |p, v| p.price = v.and_then(|v| v.as_decimal()).unwrap_or_default(),
                ),
        )
        .field(
            Field::textarea("description")
                .label("Description")
                .rule(Rule::Length {
                    min: None,
                    max: Some(DESCRIPTION_MAX_LENGTH),
                })
                .map(
                    |p: &Product| p.description.clone(),
                    |p, v| p.description = v.and_then(FieldValue::into_text),
                ),
        )
        .field(
            Field::file(IMAGE_FIELD)
                .label("Image")
                .rule(Rule::MaxFileSize(uploads.max_file_size))
                .rule(Rule::MimeTypes(uploads.allowed_mime_types.clone())),
        )
        .build()
}
