//! 上传文件存储

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::UploadedFile;

/// 上传失败原因
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unable to create the \"{}\" directory: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Could not move the file to \"{}\": {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 文件存储
#[async_trait]
pub trait FileStore: Send + Sync {
    /// 以给定文件名保存内容，返回落盘路径
    async fn store(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, UploadError>;
}

/// 本地目录存储
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    directory: PathBuf,
}

impl LocalFileStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, UploadError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|source| UploadError::CreateDirectory {
                path: self.directory.clone(),
                source,
            })?;

        let path = self.directory.join(file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| UploadError::Write {
                path: path.clone(),
                source,
            })?;

        debug!("stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// 生成文件名并保存上传文件，成功时返回保存的文件名
pub async fn store_upload(
    store: &dyn FileStore,
    file: &UploadedFile,
) -> Result<String, UploadError> {
    let file_name = file.target_file_name();
    store.store(&file.bytes, &file_name).await?;
    Ok(file_name)
}
