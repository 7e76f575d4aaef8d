//! 应用配置模块
//!
//! 提供语音助手配置的加载、保存和管理功能
//!
//! # 配置存储位置
//!
//! - Windows: `%APPDATA%/dailyflow/voice.json`
//! - macOS: `~/Library/Application Support/dailyflow/voice.json`
//! - Linux: `~/.config/dailyflow/voice.json`
//!
//! # 使用示例
//!
//! ```no_run
//! use dailyflow_voice::state::config::ConfigManager;
//!
//! // 加载配置
//! let mut config = ConfigManager::load()?;
//!
//! // 修改配置
//! config.api.voice_name = Some("Puck".to_string());
//!
//! // 保存配置
//! ConfigManager::save(&config)?;
//! # Ok::<(), dailyflow_voice::state::ConfigError>(())
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::pipeline::DEFAULT_CHUNK_SAMPLES;
use crate::network::connection::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_VOICE};
use crate::network::LiveConfig;

/// 配置目录名
const CONFIG_DIR_NAME: &str = "dailyflow";

/// 配置文件名
const CONFIG_FILE_NAME: &str = "voice.json";

/// 优先于配置文件的 API 密钥环境变量（按顺序查找）
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// 默认连接超时（毫秒）
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// 路径错误
    #[error("Path error: {0}")]
    Path(String),
}

/// 配置结果类型
pub type ConfigResult<T> = Result<T, ConfigError>;

/// 应用配置
///
/// 包含语音助手的所有设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// API 配置
    pub api: ApiConfig,
    /// 音频配置
    pub audio: AudioConfig,
    /// 会话配置
    pub session: SessionSettings,
}

/// API 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Gemini API 密钥
    pub api_key: String,
    /// 模型名称
    pub model: String,
    /// 预置音色（None 表示由服务端选择）
    pub voice_name: Option<String>,
    /// WebSocket 端点
    pub endpoint: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            voice_name: Some(DEFAULT_VOICE.to_string()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

impl ApiConfig {
    /// 实际使用的 API 密钥
    ///
    /// 环境变量优先，其次是配置文件中的值
    pub fn resolved_api_key(&self) -> String {
        Self::pick_api_key(&self.api_key, |name| std::env::var(name).ok())
    }

    fn pick_api_key(stored: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
        API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .unwrap_or_else(|| stored.trim().to_string())
    }

    /// 构建 Live API 会话配置
    pub fn live_config(&self, connect_timeout_ms: Option<u64>) -> LiveConfig {
        let mut config = LiveConfig::new()
            .with_model(self.model.clone())
            .with_endpoint(self.endpoint.clone());
        config.voice_name = self.voice_name.clone();
        if let Some(timeout_ms) = connect_timeout_ms {
            config = config.with_timeout(timeout_ms);
        }
        config
    }
}

/// 音频配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// 输入设备 ID（None 表示默认设备）
    pub input_device_id: Option<String>,
    /// 输出设备 ID（None 表示默认设备）
    pub output_device_id: Option<String>,
    /// 每个上行音频块的采样数（16 kHz）
    pub chunk_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_device_id: None,
            output_device_id: None,
            chunk_samples: DEFAULT_CHUNK_SAMPLES,
        }
    }
}

/// 会话配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// 等待服务端确认的超时（毫秒），None 表示无限等待
    pub connect_timeout_ms: Option<u64>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

/// 配置管理器
///
/// 提供配置的加载、保存和管理功能
pub struct ConfigManager;

impl ConfigManager {
    /// 从默认位置加载配置
    ///
    /// 如果文件不存在则返回默认配置
    pub fn load() -> ConfigResult<AppConfig> {
        Self::load_from(&Self::config_path()?)
    }

    /// 从指定路径加载配置
    pub fn load_from(path: &Path) -> ConfigResult<AppConfig> {
        tracing::debug!(path = %path.display(), "Loading config");

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: AppConfig = serde_json::from_str(&content)?;
            tracing::info!(path = %path.display(), "Config loaded successfully");
            Ok(config)
        } else {
            tracing::info!("Config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }

    /// 保存配置到默认位置
    pub fn save(config: &AppConfig) -> ConfigResult<()> {
        Self::save_to(&Self::config_path()?, config)
    }

    /// 保存配置到指定路径
    pub fn save_to(path: &Path, config: &AppConfig) -> ConfigResult<()> {
        tracing::debug!(path = %path.display(), "Saving config");

        // 确保目录存在
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(config)?;
        std::fs::write(path, content)?;

        tracing::info!(path = %path.display(), "Config saved successfully");
        Ok(())
    }

    /// 获取配置文件路径
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// 获取配置目录路径
    pub fn config_dir() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or_else(|| ConfigError::Path("No configuration directory on this platform".into()))
    }

    /// 检查配置文件是否存在
    pub fn exists() -> ConfigResult<bool> {
        Ok(Self::config_path()?.exists())
    }

    /// 重置为默认配置
    pub fn reset() -> ConfigResult<AppConfig> {
        let config = AppConfig::default();
        Self::save(&config)?;
        tracing::info!("Config reset to defaults");
        Ok(config)
    }
}

/// 全局配置状态
///
/// 使用 ArcSwap 实现无锁读取
pub struct GlobalConfig {
    config: ArcSwap<AppConfig>,
}

impl GlobalConfig {
    /// 创建新的全局配置
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: ArcSwap::new(Arc::new(config)),
        }
    }

    /// 获取当前配置
    pub fn get(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// 更新配置
    pub fn update(&self, config: AppConfig) {
        self.config.store(Arc::new(config));
    }

    /// 更新 API 密钥
    pub fn set_api_key(&self, api_key: String) {
        let mut config = (*self.config.load_full()).clone();
        config.api.api_key = api_key;
        self.config.store(Arc::new(config));
    }

    /// 获取实际使用的 API 密钥
    pub fn api_key(&self) -> String {
        self.config.load_full().api.resolved_api_key()
    }

    /// 检查 API 密钥是否已配置
    pub fn has_api_key(&self) -> bool {
        !self.api_key().is_empty()
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
