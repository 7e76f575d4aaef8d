//! 语音会话管理模块
//!
//! 把音频采集、播放调度、Live API 连接和状态机组合成一个完整的语音会话
//!
//! # 使用示例
//!
//! ```no_run
//! use dailyflow_voice::session::VoiceAssistant;
//! use dailyflow_voice::state::config::ConfigManager;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::load()?;
//! let assistant = VoiceAssistant::from_config(&config)?;
//!
//! // 打开会话，等待服务端确认后开始监听
//! assistant.open().await?;
//!
//! // 关闭会话，释放麦克风和扬声器
//! assistant.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # 工作流程
//!
//! ```text
//! 1. open()
//!    └── State: Idle/Error -> Connecting
//!    └── 获取麦克风和扬声器，建立 WebSocket 连接并发送 setup
//!
//! 2. 服务端返回 setupComplete
//!    └── State: Connecting -> Connected(Listening)
//!    └── 启动采集管线，麦克风音频开始上行
//!
//! 3. 收到模型语音
//!    └── 解码并排到播放头之后
//!    └── State: Connected(Listening) -> Connected(Speaking)
//!
//! 4. 播放完毕或用户打断
//!    └── State: Connected(Speaking) -> Connected(Listening)
//!
//! 5. close() 或服务端关闭
//!    └── State: -> Idle
//! ```

use std::time::Duration;

use crate::audio::codec::OUTPUT_SAMPLE_RATE;
use crate::audio::error::AudioError;
use crate::audio::pipeline::DEFAULT_CHUNK_SAMPLES;
use crate::network::error::NetworkError;
use crate::state::config::{AppConfig, DEFAULT_CONNECT_TIMEOUT_MS};
use crate::state::TransitionError;

mod assistant;
mod controller;

pub use assistant::{SessionCommand, VoiceAssistant};
pub use controller::{SessionController, SessionMessage};

/// 会话配置
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// 每个上行音频块的采样数（16 kHz）
    pub capture_chunk_samples: usize,
    /// 从 open 到服务端确认的最长等待时间，None 表示无限等待
    pub connect_timeout: Option<Duration>,
    /// 下行语音的采样率
    pub output_sample_rate: u32,
    /// 下行语音的声道数
    pub output_channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_chunk_samples: DEFAULT_CHUNK_SAMPLES,
            connect_timeout: Some(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS)),
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            output_channels: 1,
        }
    }
}

impl SessionConfig {
    /// 从应用配置创建会话配置
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            capture_chunk_samples: config.audio.chunk_samples.max(1),
            connect_timeout: config.session.connect_timeout_ms.map(Duration::from_millis),
            ..Default::default()
        }
    }

    /// 设置连接超时
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// 设置上行音频块大小
    pub fn with_chunk_samples(mut self, chunk_samples: usize) -> Self {
        self.capture_chunk_samples = chunk_samples.max(1);
        self
    }

    /// 连接超时（毫秒），用于错误信息
    pub(crate) fn connect_timeout_ms(&self) -> u64 {
        self.connect_timeout
            .map(|timeout| timeout.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// 会话错误
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// 麦克风被拒绝或不存在
    #[error("Microphone unavailable: {0}")]
    PermissionDenied(#[source] AudioError),

    /// 其他音频设备错误
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// 连接或传输错误
    #[error("Transport error: {0}")]
    Transport(#[from] NetworkError),

    /// 状态错误
    #[error("State error: {0}")]
    State(#[from] TransitionError),

    /// 会话线程启动失败
    #[error("Failed to start session thread: {0}")]
    Runtime(#[from] std::io::Error),

    /// 连接尚未完成时被 close() 或新的 open() 取消
    #[error("Session open was cancelled")]
    Cancelled,

    /// 会话线程已退出
    #[error("Voice session has shut down")]
    Shutdown,
}

impl SessionError {
    /// 把打开麦克风时的错误归类
    pub fn from_microphone(err: AudioError) -> Self {
        if err.is_microphone_unavailable() {
            Self::PermissionDenied(err)
        } else {
            Self::Audio(err)
        }
    }

    /// 是否为麦克风权限问题
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// 会话结果类型
pub type SessionResult<T> = Result<T, SessionError>;
