//! # Thread Types

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const DEFAULT_THREAD_TITLE: &str = "New Thread";

/// 自动生成标题的最大字符数
const TITLE_MAX_CHARS: usize = 48;

/// 一个对话 thread 的元数据，消息单独存放
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Thread {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: DEFAULT_THREAD_TITLE.to_string(),
            assistant_id: None,
            model: None,
            created_at: now,
            updated_at: now,
            message_count: 0,
            metadata: HashMap::new(),
        }
    }

    /// 使用随机 id 创建
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_assistant(mut self, assistant_id: impl Into<String>) -> Self {
        self.assistant_id = Some(assistant_id.into());
        self
    }

    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_THREAD_TITLE
    }

    /// 用第一条用户消息生成标题（只取第一行，截断）
    pub fn title_from(text: &str) -> String {
        let line = text.lines().next().unwrap_or_default().trim();
        if line.is_empty() {
            return DEFAULT_THREAD_TITLE.to_string();
        }
        let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
        if line.chars().count() > TITLE_MAX_CHARS {
            title.push('…');
        }
        title
    }

    /// 记录一条新消息
    pub fn record_message(&mut self) {
        self.message_count += 1;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
