use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 主配置结构体
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            llm: LlmConfig::default(),
            registry: RegistryConfig::default(),
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, what: &str) -> ConfigResult<T> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid {}: {}", what, value)))
}

impl Config {
    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["llm", "default_provider"] => Some(self.llm.default_provider.clone()),
            ["llm", "providers", name, field] => {
                let provider = self.llm.providers.get(*name)?;
                match *field {
                    "base_url" => Some(provider.base_url.clone()),
                    "model" => provider.model.clone(),
                    "enabled" => Some(provider.enabled.to_string()),
                    "timeout_seconds" => provider.timeout_seconds.map(|t| t.to_string()),
                    _ => None,
                }
            }
            ["registry", "url"] => Some(self.registry.url.clone()),
            ["registry", "timeout_seconds"] => Some(self.registry.timeout_seconds.to_string()),
            ["registry", "client_name"] => Some(self.registry.client_name.clone()),
            ["agent", "max_iterations"] => Some(self.agent.max_iterations.to_string()),
            ["agent", "temperature"] => Some(self.agent.temperature.to_string()),
            ["agent", "stream"] => Some(self.agent.stream.to_string()),
            ["agent", "system_prompt"] => self.agent.system_prompt.clone(),
            ["storage", "path"] => Some(self.storage.path.clone()),
            ["logging", "level"] => Some(self.logging.level.as_str().to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["llm", "default_provider"] => {
                self.llm.default_provider = value.to_string();
            }
            ["llm", "providers", name, field] => {
                let provider = self
                    .llm
                    .providers
                    .get_mut(*name)
                    .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
                match *field {
                    "base_url" => provider.base_url = value.to_string(),
                    "model" => provider.model = Some(value.to_string()),
                    "enabled" => provider.enabled = parse_field(value, "boolean")?,
                    "timeout_seconds" => provider.timeout_seconds = Some(parse_field(value, "number")?),
                    _ => return Err(ConfigError::KeyNotFound(key.to_string())),
                }
            }
            ["registry", "url"] => {
                self.registry.url = value.to_string();
            }
            ["registry", "timeout_seconds"] => {
                self.registry.timeout_seconds = parse_field(value, "number")?;
            }
            ["registry", "client_name"] => {
                self.registry.client_name = value.to_string();
            }
            ["agent", "max_iterations"] => {
                self.agent.max_iterations = parse_field(value, "number")?;
            }
            ["agent", "temperature"] => {
                self.agent.temperature = parse_field(value, "temperature")?;
            }
            ["agent", "stream"] => {
                self.agent.stream = parse_field(value, "boolean")?;
            }
            ["agent", "system_prompt"] => {
                self.agent.system_prompt = Some(value.to_string());
            }
            ["storage", "path"] => {
                self.storage.path = value.to_string();
            }
            ["logging", "level"] => {
                self.logging.level = value.parse()?;
            }
            ["logging", "file"] => {
                self.logging.file = Some(value.to_string());
            }
            ["logging", "json"] => {
                self.logging.json = parse_field(value, "boolean")?;
            }
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

/// LLM 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub default_provider: String,
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();

        // 本地推理服务，固定 key
        providers.insert(
            "local".to_string(),
            ProviderSettings {
                enabled: true,
                base_url: "http://127.0.0.1:39291/v1".to_string(),
                model: None,
                auth: AuthSettings::Static {
                    key: "mcp".to_string(),
                },
                headers: None,
                timeout_seconds: Some(120),
            },
        );

        providers.insert(
            "openai".to_string(),
            ProviderSettings {
                enabled: false,
                base_url: "https://api.openai.com/v1".to_string(),
                model: Some("gpt-4o-mini".to_string()),
                auth: AuthSettings::ApiKey {
                    env: "OPENAI_API_KEY".to_string(),
                },
                headers: None,
                timeout_seconds: Some(60),
            },
        );

        Self {
            default_provider: "local".to_string(),
            providers,
        }
    }
}

impl LlmConfig {
    pub fn default_provider_settings(&self) -> Option<&ProviderSettings> {
        self.providers.get(&self.default_provider)
    }
}

/// Provider 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(flatten)]
    pub auth: AuthSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthSettings {
    /// API Key authentication - reads from environment variable
    ApiKey { env: String },
    /// Bearer token authentication - reads from environment variable
    Bearer { env: String },
    /// Key written directly in the config, e.g. for a local server
    Static { key: String },
    #[default]
    None,
}

impl AuthSettings {
    /// Get API key from environment (or the config) if applicable
    pub fn get_api_key(&self) -> Option<String> {
        match self {
            Self::ApiKey { env } => std::env::var(env).ok(),
            Self::Static { key } => Some(key.clone()),
            _ => None,
        }
    }

    /// Get bearer token from environment if applicable
    pub fn get_bearer_token(&self) -> Option<String> {
        match self {
            Self::Bearer { env } => std::env::var(env).ok(),
            _ => None,
        }
    }
}

/// Tool registry 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(default = "default_registry_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

fn default_registry_timeout() -> u64 {
    30
}

fn default_client_name() -> String {
    "cinder-mcp-client".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/mcp".to_string(),
            timeout_seconds: default_registry_timeout(),
            client_name: default_client_name(),
        }
    }
}

/// Agent 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub max_iterations: usize,
    pub temperature: f32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            temperature: 0.2,
            stream: false,
            system_prompt: None,
        }
    }
}

/// Storage 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.cinder/threads".to_string(),
        }
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default)]
    pub json: bool,
    /// 模块级别，例如 `cinder_llm = "debug"`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub module_levels: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            json: false,
            module_levels: HashMap::new(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.default_provider, "local");
        assert_eq!(config.agent.max_iterations, 10);
        assert!((config.agent.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(
            config.llm.default_provider_settings().and_then(|p| p.auth.get_api_key()),
            Some("mcp".to_string())
        );
    }

    #[test]
    fn test_provider_settings_serialization() {
        let settings = ProviderSettings {
            enabled: true,
            base_url: "https://api.openai.com/v1".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            auth: AuthSettings::ApiKey {
                env: "OPENAI_API_KEY".to_string(),
            },
            headers: None,
            timeout_seconds: None,
        };

        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["auth_type"], "api_key");
        assert_eq!(json["env"], "OPENAI_API_KEY");
        assert!(json.get("headers").is_none());

        let back: ProviderSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_get_and_set_value() {
        let mut config = Config::default();
        config.set_value("agent.max_iterations", "4").unwrap();
        config.set_value("logging.level", "debug").unwrap();
        config.set_value("llm.providers.local.model", "llama3").unwrap();

        assert_eq!(config.get_value("agent.max_iterations").as_deref(), Some("4"));
        assert_eq!(config.get_value("logging.level").as_deref(), Some("debug"));
        assert_eq!(config.get_value("llm.providers.local.model").as_deref(), Some("llama3"));
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_value("agent.stream", "maybe"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.set_value("agent.unknown", "1"),
            Err(ConfigError::KeyNotFound(_))
        ));
        assert!(matches!(
            config.set_value("llm.providers.nope.model", "x"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_sections_default_when_missing() {
        let config: Config = serde_json::from_str(r#"{"version": "0.1.0"}"#).unwrap();
        assert_eq!(config.registry, RegistryConfig::default());
        assert_eq!(config.agent.max_iterations, 10);
    }
}
