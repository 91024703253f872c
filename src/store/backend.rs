//! 文档存储后端：按名称读写整个 JSON 文档
//!
//! 文件不存在时自动创建为 `{}`；写入总是整文档覆盖（先写临时文件再 rename）。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::fs;

use crate::core::BotError;

/// 空文档的内容
pub const EMPTY_DOCUMENT: &[u8] = b"{}";

/// 文档存储接口
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// 读取文档；不存在时创建为 `{}` 并返回它
    async fn read(&self, name: &str) -> Result<Vec<u8>, BotError>;

    /// 用 `bytes` 覆盖整个文档
    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), BotError>;
}

/// 数据目录下的 JSON 文件
#[derive(Debug, Clone)]
pub struct FsBackend {
    dir: PathBuf,
}

impl FsBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl DocumentBackend for FsBackend {
    async fn read(&self, name: &str) -> Result<Vec<u8>, BotError> {
        let path = self.path_of(name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(document = %name, "Document missing, creating empty one");
                self.write(name, EMPTY_DOCUMENT).await?;
                Ok(EMPTY_DOCUMENT.to_vec())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), BotError> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_of(name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// 内存后端：测试用，可切换为写入失败以模拟磁盘错误
#[derive(Debug, Default)]
pub struct MemoryBackend {
    docs: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置一个文档
    pub fn with_document(self, name: &str, json: &str) -> Self {
        self.lock().insert(name.to_string(), json.as_bytes().to_vec());
        self
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 当前持久化的文档内容
    pub fn snapshot(&self, name: &str) -> Option<serde_json::Value> {
        self.lock()
            .get(name)
            .and_then(|bytes| serde_json::from_slice(bytes).ok())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn read(&self, name: &str) -> Result<Vec<u8>, BotError> {
        let mut docs = self.lock();
        Ok(docs
            .entry(name.to_string())
            .or_insert_with(|| EMPTY_DOCUMENT.to_vec())
            .clone())
    }

    async fn write(&self, name: &str, bytes: &[u8]) -> Result<(), BotError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BotError::Persistence(format!("write to {} refused", name)));
        }
        self.lock().insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
