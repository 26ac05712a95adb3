//! # JsonlThreadStore
//!
//! 基于文件的 thread 存储实现。
//!
//! 存储结构:
//! ```text
//! <base_path>/
//! ├── threads/
//! │   ├── <thread_id>.json       # thread 元数据
//! │   └── ...
//! └── messages/
//!     ├── <thread_id>.jsonl      # 消息（追加写入）
//!     └── ...
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cinder_core::types::Message;
use parking_lot::RwLock;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::store::{ensure_finalized, ThreadStore};
use crate::types::Thread;

/// JSONL 文件存储
pub struct JsonlThreadStore {
    base_path: PathBuf,
    threads_path: PathBuf,
    messages_path: PathBuf,
    /// thread 元数据缓存，锁不跨 await 持有
    index: Arc<RwLock<HashMap<String, Thread>>>,
}

impl JsonlThreadStore {
    /// 打开（或创建）存储目录，`~` 会被展开
    pub async fn open(base_path: impl AsRef<Path>) -> StorageResult<Self> {
        let base_path_str = base_path.as_ref().to_string_lossy().to_string();
        let base_path = PathBuf::from(shellexpand::tilde(&base_path_str).as_ref());

        let threads_path = base_path.join("threads");
        let messages_path = base_path.join("messages");

        // 创建目录
        fs::create_dir_all(&threads_path).await?;
        fs::create_dir_all(&messages_path).await?;

        let store = Self {
            base_path,
            threads_path,
            messages_path,
            index: Arc::new(RwLock::new(HashMap::new())),
        };

        store.rebuild_index().await?;
        info!("JsonlThreadStore initialized at {:?}", store.base_path);
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn thread_file_path(&self, thread_id: &str) -> PathBuf {
        self.threads_path.join(format!("{}.json", thread_id))
    }

    fn message_file_path(&self, thread_id: &str) -> PathBuf {
        self.messages_path.join(format!("{}.jsonl", thread_id))
    }

    async fn write_thread_file(&self, thread: &Thread) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(thread)?;
        fs::write(self.thread_file_path(&thread.id), content).await?;
        Ok(())
    }

    /// 从磁盘重建元数据缓存，损坏的文件跳过
    async fn rebuild_index(&self) -> StorageResult<()> {
        let mut entries = fs::read_dir(&self.threads_path).await?;
        let mut loaded = HashMap::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Thread>(&content) {
                Ok(thread) => {
                    loaded.insert(thread.id.clone(), thread);
                }
                Err(e) => {
                    warn!("Failed to parse thread metadata {:?}: {}", path, e);
                }
            }
        }

        info!("Rebuilt index with {} threads", loaded.len());
        *self.index.write() = loaded;
        Ok(())
    }

    fn cached(&self, thread_id: &str) -> Option<Thread> {
        self.index.read().get(thread_id).cloned()
    }
}

#[async_trait]
impl ThreadStore for JsonlThreadStore {
    async fn create_thread(&self, thread: &Thread) -> StorageResult<()> {
        if self.cached(&thread.id).is_some() {
            return Err(StorageError::ThreadAlreadyExists { id: thread.id.clone() });
        }

        self.write_thread_file(thread).await?;
        self.index.write().insert(thread.id.clone(), thread.clone());
        debug!("Created thread: {}", thread.id);
        Ok(())
    }

    async fn save_thread(&self, thread: &Thread) -> StorageResult<()> {
        self.write_thread_file(thread).await?;
        self.index.write().insert(thread.id.clone(), thread.clone());
        debug!("Saved thread: {}", thread.id);
        Ok(())
    }

    async fn load_thread(&self, thread_id: &str) -> StorageResult<Option<Thread>> {
        Ok(self.cached(thread_id))
    }

    async fn list_threads(&self) -> StorageResult<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.index.read().values().cloned().collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }

    async fn delete_thread(&self, thread_id: &str) -> StorageResult<()> {
        if self.index.write().remove(thread_id).is_none() {
            return Err(StorageError::thread_not_found(thread_id));
        }

        let thread_path = self.thread_file_path(thread_id);
        if thread_path.exists() {
            fs::remove_file(&thread_path).await?;
        }
        let message_path = self.message_file_path(thread_id);
        if message_path.exists() {
            fs::remove_file(&message_path).await?;
        }

        info!("Deleted thread: {}", thread_id);
        Ok(())
    }

    async fn append_message(&self, thread_id: &str, message: &Message) -> StorageResult<()> {
        ensure_finalized(message)?;
        let mut thread = self
            .cached(thread_id)
            .ok_or_else(|| StorageError::thread_not_found(thread_id))?;

        let line = serde_json::to_string(message)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.message_file_path(thread_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        thread.record_message();
        self.save_thread(&thread).await?;

        debug!("Appended message {} to thread {}", message.id, thread_id);
        Ok(())
    }

    async fn load_messages(&self, thread_id: &str) -> StorageResult<Vec<Message>> {
        if self.cached(thread_id).is_none() {
            return Err(StorageError::thread_not_found(thread_id));
        }

        let path = self.message_file_path(thread_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let mut messages = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(message) => messages.push(message),
                Err(e) => {
                    warn!("Failed to parse message line in thread {}: {}", thread_id, e);
                }
            }
        }

        Ok(messages)
    }
}
