//! 内存实现，用于测试和不落盘的会话

use async_trait::async_trait;
use cinder_core::types::Message;
use dashmap::DashMap;

use crate::error::{StorageError, StorageResult};
use crate::store::{ensure_finalized, ThreadStore};
use crate::types::Thread;

#[derive(Debug, Default)]
pub struct InMemoryThreadStore {
    threads: DashMap<String, (Thread, Vec<Message>)>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create_thread(&self, thread: &Thread) -> StorageResult<()> {
        match self.threads.entry(thread.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StorageError::ThreadAlreadyExists {
                id: thread.id.clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert((thread.clone(), Vec::new()));
                Ok(())
            }
        }
    }

    async fn save_thread(&self, thread: &Thread) -> StorageResult<()> {
        self.threads
            .entry(thread.id.clone())
            .and_modify(|(existing, _)| *existing = thread.clone())
            .or_insert_with(|| (thread.clone(), Vec::new()));
        Ok(())
    }

    async fn load_thread(&self, thread_id: &str) -> StorageResult<Option<Thread>> {
        Ok(self.threads.get(thread_id).map(|entry| entry.0.clone()))
    }

    async fn list_threads(&self) -> StorageResult<Vec<Thread>> {
        let mut threads: Vec<Thread> = self.threads.iter().map(|entry| entry.0.clone()).collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads)
    }

    async fn delete_thread(&self, thread_id: &str) -> StorageResult<()> {
        self.threads
            .remove(thread_id)
            .map(|_| ())
            .ok_or_else(|| StorageError::thread_not_found(thread_id))
    }

    async fn append_message(&self, thread_id: &str, message: &Message) -> StorageResult<()> {
        ensure_finalized(message)?;
        let mut entry = self
            .threads
            .get_mut(thread_id)
            .ok_or_else(|| StorageError::thread_not_found(thread_id))?;
        let (thread, messages) = entry.value_mut();
        messages.push(message.clone());
        thread.record_message();
        Ok(())
    }

    async fn load_messages(&self, thread_id: &str) -> StorageResult<Vec<Message>> {
        self.threads
            .get(thread_id)
            .map(|entry| entry.1.clone())
            .ok_or_else(|| StorageError::thread_not_found(thread_id))
    }
}
