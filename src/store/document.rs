//! 内存文档 + 单写者任务
//!
//! 文档启动时加载一次，此后只能通过 [`Document::mutate`] 修改。修改在文档锁内完成，
//! 并在持锁期间把整份序列化结果排入 [`DocumentWriter`] 的队列，因此落盘顺序与修改顺序一致；
//! 写入由唯一的写者任务串行执行，不会出现两个 chat 并发修改导致的丢失更新。

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::backend::DocumentBackend;
use crate::core::BotError;

/// 写请求：整份文档
struct WriteRequest {
    name: String,
    bytes: Vec<u8>,
    done: oneshot::Sender<Result<(), BotError>>,
}

/// 单写者任务的句柄
#[derive(Clone)]
pub struct DocumentWriter {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

impl DocumentWriter {
    /// 启动写者任务；所有句柄被丢弃后任务自行结束
    pub fn spawn(backend: Arc<dyn DocumentBackend>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteRequest>();
        let handle = tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                let result = backend.write(&req.name, &req.bytes).await;
                match &result {
                    Ok(()) => tracing::debug!(document = %req.name, bytes = req.bytes.len(), "Document written"),
                    Err(e) => tracing::warn!(document = %req.name, error = %e, "Document write failed"),
                }
                let _ = req.done.send(result);
            }
            tracing::debug!("Document writer stopped");
        });
        (Self { tx }, handle)
    }

    fn submit(&self, name: &str, bytes: Vec<u8>) -> oneshot::Receiver<Result<(), BotError>> {
        let (done, rx) = oneshot::channel();
        // 写者已退出时请求随 SendError 一起被丢弃，rx 会收到 RecvError
        let _ = self.tx.send(WriteRequest {
            name: name.to_string(),
            bytes,
            done,
        });
        rx
    }
}

/// 一份按 ChatId 组织的 JSON 文档
pub struct Document<T> {
    name: String,
    data: Mutex<T>,
    writer: DocumentWriter,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned + Default + Send,
{
    /// 从后端加载；空文件视为空文档
    pub async fn load(
        name: &str,
        backend: &dyn DocumentBackend,
        writer: DocumentWriter,
    ) -> Result<Self, BotError> {
        let bytes = backend.read(name).await?;
        let data = if bytes.iter().all(u8::is_ascii_whitespace) {
            T::default()
        } else {
            serde_json::from_slice(&bytes)?
        };
        tracing::info!(document = %name, "Document loaded");
        Ok(Self::new(name, data, writer))
    }

    pub fn new(name: &str, data: T, writer: DocumentWriter) -> Self {
        Self {
            name: name.to_string(),
            data: Mutex::new(data),
            writer,
        }
    }

    /// 只读访问
    pub async fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let data = self.data.lock().await;
        f(&data)
    }

    /// 修改文档并整份重写。
    ///
    /// - `f` 返回错误：文档未被写入，错误原样返回（`f` 应保证出错时不留下部分修改）
    /// - 写入失败：返回 [`BotError::Persistence`]，内存中的修改保留
    pub async fn mutate<R, F>(&self, f: F) -> Result<R, BotError>
    where
        F: FnOnce(&mut T) -> Result<R, BotError>,
    {
        let (value, pending) = {
            let mut data = self.data.lock().await;
            let value = f(&mut data)?;
            match serde_json::to_vec(&*data) {
                Ok(bytes) => (value, self.writer.submit(&self.name, bytes)),
                Err(e) => {
                    tracing::warn!(document = %self.name, error = %e, "Could not encode document");
                    return Err(e.into());
                }
            }
        };

        match pending.await {
            Ok(Ok(())) => Ok(value),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BotError::Persistence("document writer stopped".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use std::collections::BTreeMap;

    type Counters = BTreeMap<String, u32>;

    async fn counters(backend: Arc<MemoryBackend>) -> Arc<Document<Counters>> {
        let (writer, _) = DocumentWriter::spawn(backend.clone());
        Arc::new(Document::load("counters.json", backend.as_ref(), writer).await.unwrap())
    }

    #[tokio::test]
    async fn test_concurrent_mutations_are_not_lost() {
        let backend = Arc::new(MemoryBackend::new());
        let doc = counters(backend.clone()).await;

        let mut handles = Vec::new();
        for chat in 0..20 {
            let doc = Arc::clone(&doc);
            handles.push(tokio::spawn(async move {
                doc.mutate(|c| {
                    c.insert(format!("chat{}", chat), chat);
                    Ok(())
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let persisted = backend.snapshot("counters.json").unwrap();
        assert_eq!(persisted.as_object().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_failed_closure_writes_nothing() {
        let backend = Arc::new(MemoryBackend::new().with_document("counters.json", r#"{"a":1}"#));
        let doc = counters(backend.clone()).await;

        let result: Result<(), BotError> = doc
            .mutate(|_| Err(BotError::validation("nope")))
            .await;
        assert_eq!(result, Err(BotError::validation("nope")));
        assert_eq!(backend.snapshot("counters.json").unwrap()["a"], 1);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_in_memory_change() {
        let backend = Arc::new(MemoryBackend::new());
        let doc = counters(backend.clone()).await;
        backend.set_fail_writes(true);

        let result = doc
            .mutate(|c| {
                c.insert("kept".to_string(), 1);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(BotError::Persistence(_))));
        assert_eq!(doc.read(|c| c.get("kept").copied()).await, Some(1));
        assert_eq!(backend.snapshot("counters.json").unwrap(), serde_json::json!({}));
    }
}
