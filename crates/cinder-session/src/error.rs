//! # Storage Error Types
//!
//! 定义存储系统相关的错误类型。

use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// thread 不存在
    #[error("Thread not found: {id}")]
    ThreadNotFound { id: String },

    /// thread 已存在
    #[error("Thread already exists: {id}")]
    ThreadAlreadyExists { id: String },

    /// 只接受已完成的消息
    #[error("Message is not finalized: {id}")]
    MessageNotFinalized { id: String },

    /// 其他错误
    #[error("Storage error: {message}")]
    Other { message: String },
}

impl StorageError {
    /// 创建其他错误
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn thread_not_found(id: impl Into<String>) -> Self {
        Self::ThreadNotFound { id: id.into() }
    }
}

/// 存储结果类型
pub type StorageResult<T> = Result<T, StorageError>;
