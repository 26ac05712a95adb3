use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cinder_agent::{ConversationDriver, DriverConfig, Termination, TurnContext};
use cinder_config::{AuthSettings, Config, ConfigManager, ProviderSettings};
use cinder_core::{
    BroadcastSink, CancellationRegistry, Message, MessageEvent, MessageObserver, ObserverError, Role,
    TokenSpeedTracker,
};
use cinder_llm::{OpenAiProvider, ProviderConfig};
use cinder_mcp::{HttpRegistryClient, HttpRegistryConfig, RegistryTransport};
use cinder_observability::{LogManager, LoggingConfig};
use cinder_session::{JsonlThreadStore, PersistenceObserver, Thread, ThreadStore};
use cinder_tool::LocalToolRegistry;
use tokio::sync::broadcast;

#[derive(Parser)]
#[command(name = "cinder")]
#[command(about = "Tool-calling chat turns against a local or remote model")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "CINDER_CONFIG", default_value = "~/.cinder/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行一轮对话
    Chat(ChatArgs),
    /// 列出 registry 提供的工具
    Tools,
    /// 查看 thread 列表或某个 thread 的消息
    History {
        /// thread ID，省略时列出所有 thread
        #[arg(long)]
        thread: Option<String>,
    },
    /// 配置管理命令
    Config(ConfigArgs),
}

#[derive(Args)]
struct ChatArgs {
    /// 消息内容
    message: String,

    /// 继续已有的 thread
    #[arg(long)]
    thread: Option<String>,

    /// 模型 ID，默认取 provider 配置
    #[arg(long)]
    model: Option<String>,

    /// 使用流式输出
    #[arg(long)]
    stream: bool,

    /// 不连接 registry，本轮不提供工具
    #[arg(long)]
    no_tools: bool,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: agent.max_iterations, registry.url)
        key: String,
    },
    /// 设置配置值
    Set {
        /// 配置键 (如: agent.max_iterations, registry.url)
        key: String,
        /// 配置值
        value: String,
    },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path = cinder_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    match cli.command {
        Commands::Config(args) => handle_config(args, &config_path, cli.debug).await,
        Commands::Chat(args) => {
            let config = load_config(&config_path).await?;
            let _logs = init_logging(&config, cli.debug)?;
            run_chat(args, &config).await
        }
        Commands::Tools => {
            let config = load_config(&config_path).await?;
            let _logs = init_logging(&config, cli.debug)?;
            list_tools(&config).await
        }
        Commands::History { thread } => {
            let config = load_config(&config_path).await?;
            show_history(&config, thread.as_deref()).await
        }
    }
}

async fn load_config(path: &Path) -> anyhow::Result<Config> {
    let manager = ConfigManager::load(path).await?;
    let config = manager.snapshot().await;
    ConfigManager::validate(&config)?;
    Ok(config)
}

fn init_logging(config: &Config, debug: bool) -> anyhow::Result<LogManager> {
    let mut logging = LoggingConfig::from(&config.logging);
    if debug {
        logging.level = "debug".to_string();
    }
    Ok(LogManager::init(logging)?)
}

/// 把配置里的 provider 设置转换成 endpoint 客户端配置
fn provider_config(name: &str, settings: &ProviderSettings) -> ProviderConfig {
    let mut config = ProviderConfig::new(name, settings.base_url.clone());
    config = match &settings.auth {
        AuthSettings::ApiKey { .. } | AuthSettings::Static { .. } => match settings.auth.get_api_key() {
            Some(key) => config.with_api_key(key),
            None => config,
        },
        AuthSettings::Bearer { .. } => match settings.auth.get_bearer_token() {
            Some(token) => config.with_bearer_token(token),
            None => config,
        },
        AuthSettings::None => config,
    };
    if let Some(model) = &settings.model {
        config = config.with_model(model.clone());
    }
    if let Some(timeout) = settings.timeout_seconds {
        config = config.with_timeout(Duration::from_secs(timeout));
    }
    for (key, value) in settings.headers.iter().flatten() {
        config = config.with_header(key.clone(), value.clone());
    }
    config
}

fn registry_client(config: &Config) -> anyhow::Result<HttpRegistryClient> {
    let registry = HttpRegistryConfig::new(config.registry.url.clone())
        .with_timeout(Duration::from_secs(config.registry.timeout_seconds))
        .with_client_name(config.registry.client_name.clone());
    Ok(HttpRegistryClient::new(registry)?)
}

fn driver_config(config: &Config, stream: bool) -> DriverConfig {
    DriverConfig::new()
        .with_max_iterations(config.agent.max_iterations)
        .with_temperature(config.agent.temperature)
        .with_streaming(stream || config.agent.stream)
}

/// 在终端上显示工具调用和结果
struct ConsoleObserver {
    /// 流式模式下回答已经逐字打印过
    streaming: bool,
}

impl MessageObserver for ConsoleObserver {
    fn name(&self) -> &str {
        "console"
    }

    fn on_message(&self, event: &MessageEvent) -> Result<(), ObserverError> {
        let message = &event.message;
        match message.role {
            Role::Assistant => {
                let text = message.text_content();
                if !self.streaming && !text.is_empty() {
                    println!("{}", text);
                } else if self.streaming && !text.is_empty() {
                    println!();
                }
                for call in message.tool_calls.iter().flatten() {
                    println!("{}", format!("🔧 {}({})", call.name, call.arguments).cyan());
                }
            }
            Role::Tool => {
                let text = message.text_content();
                if text.starts_with("ERROR:") || text.starts_with("WARNING:") {
                    println!("{}", format!("   ↳ {}", text).yellow());
                } else {
                    println!("{}", format!("   ↳ {}", text).dimmed());
                }
            }
            Role::System | Role::User => {}
        }
        Ok(())
    }
}

async fn run_chat(args: ChatArgs, config: &Config) -> anyhow::Result<()> {
    let provider_name = config.llm.default_provider.clone();
    let settings = config
        .llm
        .default_provider_settings()
        .ok_or_else(|| anyhow::anyhow!("provider '{}' is not configured", provider_name))?;
    let model = args
        .model
        .clone()
        .or_else(|| settings.model.clone())
        .ok_or_else(|| anyhow::anyhow!("no model configured; pass --model or set llm.providers.{}.model", provider_name))?;

    let provider = Arc::new(OpenAiProvider::with_config(provider_config(&provider_name, settings))?);
    let registry: Arc<dyn RegistryTransport> = if args.no_tools {
        Arc::new(LocalToolRegistry::new())
    } else {
        Arc::new(registry_client(config)?)
    };

    // thread 历史
    let store: Arc<dyn ThreadStore> = Arc::new(JsonlThreadStore::open(&config.storage.path).await?);
    let thread_id = args.thread.clone().unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut thread = store.ensure_thread(&thread_id).await?;
    let mut messages = store.load_messages(&thread_id).await?;

    if messages.is_empty() {
        if let Some(prompt) = &config.agent.system_prompt {
            let system = Message::system(prompt.clone());
            store.append_message(&thread_id, &system).await?;
            messages.push(system);
        }
    }
    if thread.has_default_title() {
        thread.title = Thread::title_from(&args.message);
        thread.model = Some(model.clone());
        store.save_thread(&thread).await?;
    }
    let user = Message::user(args.message.clone());
    store.append_message(&thread_id, &user).await?;
    messages.push(user);

    let driver_config = driver_config(config, args.stream);
    let streaming = driver_config.stream;

    let sink = Arc::new(BroadcastSink::new());
    let telemetry = Arc::new(TokenSpeedTracker::new());
    let (persistence, writer) = PersistenceObserver::spawn(store.clone());
    sink.subscribe(persistence.clone());
    sink.subscribe(Arc::new(ConsoleObserver { streaming }));

    if streaming {
        let mut deltas = sink.subscribe_deltas();
        tokio::spawn(async move {
            loop {
                match deltas.recv().await {
                    Ok(delta) => {
                        print!("{}", delta.text);
                        let _ = io::stdout().flush();
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    // Ctrl-C 取消当前这一轮
    let cancellations = Arc::new(CancellationRegistry::new());
    let token = cancellations.token_for(&thread_id);
    {
        let cancellations = cancellations.clone();
        let thread_id = thread_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellations.cancel(&thread_id);
            }
        });
    }

    let driver = ConversationDriver::new(provider, telemetry.clone(), sink.clone()).with_config(driver_config);
    let mut ctx = TurnContext::new(thread_id.clone(), registry).with_cancellation(token);

    let result = driver.run(messages, &model, &mut ctx).await;
    cancellations.release(&thread_id);

    persistence.flush().await;
    drop(driver);
    drop(sink);
    drop(persistence);
    let _ = writer.await;

    let outcome = result?;
    match outcome.termination {
        Termination::Completed => {}
        Termination::IterationCapReached => println!(
            "{}",
            format!("⚠️  Stopped after {} model calls without a final answer", outcome.iterations).yellow()
        ),
        Termination::Cancelled => println!("{}", "⚠️  Turn cancelled".yellow()),
    }

    let speed = outcome
        .last_assistant()
        .and_then(|m| telemetry.message_speed(&m.id))
        .map(|s| format!(", {:.1} tok/s", s.tokens_per_second))
        .unwrap_or_default();
    println!(
        "{}",
        format!(
            "thread {} · {} call(s) · {} tokens{}",
            thread_id, outcome.iterations, outcome.usage.total_tokens, speed
        )
        .dimmed()
    );

    Ok(())
}

async fn list_tools(config: &Config) -> anyhow::Result<()> {
    let client = registry_client(config)?;
    client.connect().await?;
    let tools = client.list_tools().await?;

    if tools.is_empty() {
        println!("{}", format!("No tools registered at {}", config.registry.url).yellow());
        return Ok(());
    }

    println!("{}", format!("🧰 {} tool(s) at {}", tools.len(), config.registry.url).cyan().bold());
    for tool in tools {
        println!("  {} {}", tool.name.green(), tool.description.unwrap_or_default().dimmed());
    }
    Ok(())
}

async fn show_history(config: &Config, thread_id: Option<&str>) -> anyhow::Result<()> {
    let store = JsonlThreadStore::open(&config.storage.path).await?;

    let Some(thread_id) = thread_id else {
        let threads = store.list_threads().await?;
        if threads.is_empty() {
            println!("{}", "No threads yet".dimmed());
        }
        for thread in threads {
            println!(
                "{}  {}  {}",
                thread.id.cyan(),
                thread.title,
                format!("{} messages, {}", thread.message_count, thread.updated_at.format("%Y-%m-%d %H:%M")).dimmed()
            );
        }
        return Ok(());
    };

    for message in store.load_messages(thread_id).await? {
        let label = match message.role {
            Role::System => "system".dimmed(),
            Role::User => "user".green(),
            Role::Assistant => "assistant".cyan(),
            Role::Tool => "tool".yellow(),
        };
        println!("{}: {}", label, message.text_content());
        for call in message.tool_calls.iter().flatten() {
            println!("  {}", format!("🔧 {}({})", call.name, call.arguments).dimmed());
        }
    }
    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: &Path, debug: bool) -> anyhow::Result<()> {
    if debug {
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(config_path).await?;
            if let Err(e) = manager.update(|config| config.set_value(&key, &value)).await {
                eprintln!("{}", format!("❌ Failed to set value: {}", e).red());
                std::process::exit(1);
            }
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!("{}", format!("⚠️  Config already exists at {:?}", config_path).yellow());
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            // 初始化目录
            cinder_config::init_cinder_dirs().await?;

            let manager = ConfigManager::new(Config::default(), config_path.to_path_buf());
            manager.save().await?;

            println!("{}", format!("✅ Config initialized at {:?}", config_path).green());
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
