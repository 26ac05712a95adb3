//! 结构化日志模块
//!
//! 提供基于 tracing 的结构化日志功能。

use parking_lot::RwLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    layer::{Layered, SubscriberExt},
    reload::{self, Handle},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;
use crate::error::{ObservabilityError, Result};

/// 日志级别重新加载句柄类型
type ReloadHandle = Handle<EnvFilter, Registry>;

/// 过滤器之上的订阅者类型
type Base = Layered<reload::Layer<EnvFilter, Registry>, Registry>;

type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// 日志管理器
#[derive(Debug)]
pub struct LogManager {
    /// 配置
    config: RwLock<LoggingConfig>,

    /// 过滤器重新加载句柄
    reload_handle: ReloadHandle,

    /// 文件写入线程的 guard，drop 时刷新缓冲
    _file_guard: Option<WorkerGuard>,
}

impl LogManager {
    /// 初始化全局日志系统
    ///
    /// 进程内只能成功一次，重复初始化返回 `Init` 错误。
    pub fn init(config: LoggingConfig) -> Result<Self> {
        // 构建环境过滤器
        let filter = build_filter(&config)?;
        let (filter, reload_handle) = reload::Layer::new(filter);

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut file_guard = None;

        if config.stderr {
            layers.push(fmt_layer(&config, std::io::stderr, config.ansi_colors));
        }

        if let Some(path) = &config.file_path {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| ObservabilityError::config(format!("Invalid log file path: {:?}", path)))?;
            std::fs::create_dir_all(dir)?;

            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(fmt_layer(&config, writer, false));
            file_guard = Some(guard);
        }

        tracing_subscriber::registry()
            .with(filter)
            .with(layers)
            .try_init()
            .map_err(|e| ObservabilityError::init(e.to_string()))?;

        tracing::info!(
            target: "cinder_observability",
            "Log manager initialized with level: {}",
            config.level
        );

        Ok(Self {
            config: RwLock::new(config),
            reload_handle,
            _file_guard: file_guard,
        })
    }

    /// 动态更新日志级别
    pub fn update_level(&self, level: &str) -> Result<()> {
        let mut candidate = self.config.read().clone();
        candidate.level = level.to_string();
        let new_filter = build_filter(&candidate)?;

        self.reload_handle
            .modify(|filter| *filter = new_filter)
            .map_err(|e| ObservabilityError::logging(format!("Failed to update log level: {}", e)))?;

        *self.config.write() = candidate;

        tracing::info!(
            target: "cinder_observability",
            "Log level updated to: {}",
            level
        );
        Ok(())
    }

    /// 获取当前配置
    pub fn config(&self) -> LoggingConfig {
        self.config.read().clone()
    }
}

fn fmt_layer<W>(config: &LoggingConfig, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_id)
        .with_line_number(config.include_line_number)
        .with_ansi(ansi);

    if config.json_format {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// 构建环境过滤器
pub(crate) fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| ObservabilityError::logging(format!("Invalid log level: {}", e)))?;

    // 添加模块级别的过滤器
    for (module, level) in &config.module_levels {
        filter = filter.add_directive(
            format!("{}={}", module, level)
                .parse()
                .map_err(|e| ObservabilityError::logging(format!("Invalid directive: {}", e)))?,
        );
    }

    Ok(filter)
}

/// 一次对话回合的 span
pub fn create_turn_span(thread_id: &str, model: &str) -> tracing::Span {
    tracing::info_span!(
        "turn",
        thread_id = %thread_id,
        model = %model,
    )
}

/// 回合内单次模型调用的 span
pub fn create_iteration_span(iteration: usize) -> tracing::Span {
    tracing::debug_span!("iteration", iteration = iteration)
}

/// 单次工具调用的 span
pub fn create_tool_span(tool: &str, call_id: &str) -> tracing::Span {
    tracing::info_span!(
        "tool",
        tool = %tool,
        call_id = %call_id,
    )
}
