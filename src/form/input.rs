//! 请求原始输入
//!
//! 从 `multipart/form-data` 或 `application/x-www-form-urlencoded` 请求体中读取文本字段和文件，
//! 其他请求（如 GET）得到空输入。

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, Method},
    Form,
};

use crate::core::error::CoreError;
use crate::upload::UploadedFile;

/// 请求中的原始字段
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    fields: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
}

impl RawInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, file: UploadedFile) -> Self {
        self.files.push((name.into(), file));
        self
    }

    /// 同名字段取第一个
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, file)| file)
    }

    /// 是否包含 `form[...]` 形式的字段
    pub fn is_submitted(&self, form_name: &str) -> bool {
        let prefix = format!("{}[", form_name);
        self.fields
            .iter()
            .map(|(key, _)| key)
            .chain(self.files.iter().map(|(key, _)| key))
            .any(|key| key.starts_with(&prefix))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, CoreError> {
        let mut input = RawInput::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| CoreError::BadRequest(e.to_string()))?
        {
            let Some(name) = field.name().map(|n| n.to_string()) else {
                continue;
            };
            match field.file_name().map(|f| f.to_string()) {
                Some(file_name) => {
                    let content_type = field.content_type().map(|c| c.to_string());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| CoreError::BadRequest(e.to_string()))?;
                    input
                        .files
                        .push((name, UploadedFile::new(file_name, content_type, bytes)));
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| CoreError::BadRequest(e.to_string()))?;
                    input.fields.push((name, value));
                }
            }
        }
        Ok(input)
    }
}

#[async_trait]
impl<S> FromRequest<S> for RawInput
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() != Method::POST {
            return Ok(RawInput::new());
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| CoreError::BadRequest(e.to_string()))?;
            RawInput::from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| CoreError::BadRequest(e.to_string()))?;
            Ok(RawInput {
                fields,
                files: Vec::new(),
            })
        } else {
            Ok(RawInput::new())
        }
    }
}
