//! # Cinder Session Storage
//!
//! thread 与消息的持久化。
//!
//! - **ThreadStore**：存储 trait
//! - **JsonlThreadStore**：元数据 JSON + 消息 JSONL 追加写入
//! - **InMemoryThreadStore**：内存实现
//! - **PersistenceObserver**：订阅广播，后台写入

pub mod error;
pub mod jsonl_store;
pub mod memory;
pub mod observer;
pub mod store;
pub mod types;

// 重新导出主要类型
pub use error::{StorageError, StorageResult};
pub use jsonl_store::JsonlThreadStore;
pub use memory::InMemoryThreadStore;
pub use observer::PersistenceObserver;
pub use store::ThreadStore;
pub use types::{Thread, DEFAULT_THREAD_TITLE};

/// 默认存储路径
pub fn default_storage_path() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(".cinder").join("threads"))
        .unwrap_or_else(|| std::path::PathBuf::from("./cinder_threads"))
}
