//! Cinder Observability Infrastructure
//!
//! 提供统一的结构化日志和 span 工具。

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;

pub use config::LoggingConfig;
pub use error::{ObservabilityError, Result};
pub use logging::{create_iteration_span, create_tool_span, create_turn_span, LogManager};

/// 便捷导入模块
pub mod prelude {
    //! 常用类型的便捷导入

    pub use crate::{LogManager, LoggingConfig, Result};

    pub use tracing::{debug, error, info, instrument, trace, warn, Span};
}
