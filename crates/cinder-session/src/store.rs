//! # Storage Traits

use async_trait::async_trait;
use cinder_core::types::Message;

use crate::error::{StorageError, StorageResult};
use crate::types::Thread;

/// Thread 存储
///
/// 只接受已完成（ready）的消息，消息按追加顺序返回。
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// 创建新 thread，已存在时报错
    async fn create_thread(&self, thread: &Thread) -> StorageResult<()>;

    /// 保存 thread 元数据（完整替换）
    async fn save_thread(&self, thread: &Thread) -> StorageResult<()>;

    async fn load_thread(&self, thread_id: &str) -> StorageResult<Option<Thread>>;

    /// 所有 thread，最近更新的在前
    async fn list_threads(&self) -> StorageResult<Vec<Thread>>;

    /// 删除 thread 及其消息
    async fn delete_thread(&self, thread_id: &str) -> StorageResult<()>;

    /// 追加一条消息，thread 必须已存在
    async fn append_message(&self, thread_id: &str, message: &Message) -> StorageResult<()>;

    async fn load_messages(&self, thread_id: &str) -> StorageResult<Vec<Message>>;

    async fn thread_exists(&self, thread_id: &str) -> StorageResult<bool> {
        Ok(self.load_thread(thread_id).await?.is_some())
    }

    /// 获取 thread，不存在时创建
    async fn ensure_thread(&self, thread_id: &str) -> StorageResult<Thread> {
        if let Some(thread) = self.load_thread(thread_id).await? {
            return Ok(thread);
        }
        let thread = Thread::new(thread_id);
        self.create_thread(&thread).await?;
        Ok(thread)
    }
}

/// 拒绝未完成的消息
pub(crate) fn ensure_finalized(message: &Message) -> StorageResult<()> {
    if message.is_ready() {
        Ok(())
    } else {
        Err(StorageError::MessageNotFinalized { id: message.id.clone() })
    }
}
