//! 上传文件处理
//!
//! 包括上传文件的内存表示、文件名生成（slug + 唯一标记 + 扩展名）和文件类型探测。
//! 实际写盘由 [`store`] 子模块完成。

pub mod store;

pub use store::{store_upload, FileStore, LocalFileStore, UploadError};

use axum::body::Bytes;

/// 表单中上传的文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// 客户端提供的原始文件名
    pub file_name: String,
    /// 客户端声明的 MIME 类型，仅作参考
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// 浏览器在未选择文件时也会提交一个空文件段
    pub fn is_empty(&self) -> bool {
        self.file_name.is_empty() && self.bytes.is_empty()
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// 根据文件内容识别的 MIME 类型，不采信客户端声明
    pub fn detected_mime(&self) -> Option<&'static str> {
        infer::get(&self.bytes).map(|kind| kind.mime_type())
    }

    /// 扩展名：文件内容 > 声明的 MIME 类型 > 原始扩展名 > `bin`
    pub fn guess_extension(&self) -> String {
        if let Some(kind) = infer::get(&self.bytes) {
            return kind.extension().to_string();
        }
        if let Some(ext) = self.content_type.as_deref().and_then(extension_for_mime) {
            return ext;
        }
        client_extension(&self.file_name).unwrap_or_else(|| "bin".to_string())
    }

    /// 落盘文件名：`{slug}-{token}.{ext}`
    pub fn target_file_name(&self) -> String {
        let base = slug(stem(&self.file_name));
        let base = if base.is_empty() {
            "file".to_string()
        } else {
            base
        };
        format!("{}-{}.{}", base, unique_token(), self.guess_extension())
    }
}

/// 转为文件名和 URL 安全的形式：小写，非字母数字连续段替换为单个 `-`
pub fn slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// 去掉路径和最后一个扩展名
pub fn stem(file_name: &str) -> &str {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[..idx],
        _ => base,
    }
}

/// 13 位十六进制唯一标记
pub fn unique_token() -> String {
    format!("{:013x}", rand::random::<u64>() & ((1u64 << 52) - 1))
}

fn extension_for_mime(mime: &str) -> Option<String> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    mime_guess::get_mime_extensions_str(essence)
        .and_then(|exts| exts.first().map(|ext| ext.to_string()))
}

fn client_extension(file_name: &str) -> Option<String> {
    let base = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(file_name);
    let (_, ext) = base.rsplit_once('.')?;
    let ext = slug(ext);
    (!ext.is_empty()).then_some(ext)
}
