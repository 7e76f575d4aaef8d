//! 全局错误处理模块
//!
//! 提供统一的应用错误类型和用户友好的错误消息
//!
//! # 功能
//!
//! - 统一的 `AppError` 类型，聚合所有模块错误
//! - 用户友好的错误消息
//! - 错误代码用于界面处理
//! - 错误恢复建议（界面据此决定是否显示重试按钮）
//!
//! # 使用示例
//!
//! ```
//! use dailyflow_voice::network::NetworkError;
//! use dailyflow_voice::utils::error::{AppError, ErrorCode};
//!
//! let err = AppError::from(NetworkError::AuthenticationFailed);
//! assert_eq!(err.code(), ErrorCode::NetworkAuthFailed);
//! assert!(err.context().recovery_hint.is_some());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::error::AudioError;
use crate::network::error::NetworkError;
use crate::playback::PlaybackError;
use crate::session::SessionError;
use crate::state::config::ConfigError;
use crate::state::StateError;

/// 应用错误类型
///
/// 聚合所有模块的错误类型，提供统一的错误处理接口
#[derive(Error, Debug)]
pub enum AppError {
    /// 音频错误
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    /// 网络错误
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// 播放错误
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    /// 配置错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 状态错误
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// 会话错误
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

/// 错误代码
///
/// 用于界面识别和处理特定错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 音频错误
    /// 找不到麦克风设备
    AudioDeviceNotFound,
    /// 麦克风权限被拒绝
    AudioPermissionDenied,
    /// 找不到扬声器设备
    AudioOutputNotFound,
    /// 音频流错误
    AudioStreamError,
    /// 重采样失败
    AudioResampleFailed,

    // 播放错误
    /// 语音数据无法解码
    PlaybackDecodeFailed,

    // 网络错误
    /// 连接失败
    NetworkConnectionFailed,
    /// 认证失败（API Key 无效）
    NetworkAuthFailed,
    /// 未配置 API Key
    NetworkMissingApiKey,
    /// 协议错误
    NetworkProtocolError,
    /// 连接超时
    NetworkTimeout,
    /// 连接断开
    NetworkClosed,

    // 配置错误
    /// 配置加载失败
    ConfigLoadFailed,
    /// 配置无效
    ConfigInvalid,

    // 状态与会话错误
    /// 非法状态转换
    StateInvalidTransition,
    /// 打开会话的请求被取消
    SessionCancelled,
    /// 会话线程已退出
    SessionShutdown,

    // 通用错误
    /// 内部错误
    InternalError,
}

/// 错误上下文信息
///
/// 提供用户友好的错误信息和恢复建议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// 错误代码
    pub code: ErrorCode,
    /// 用户友好的错误消息
    pub message: String,
    /// 详细错误信息（用于日志）
    pub detail: Option<String>,
    /// 恢复建议
    pub recovery_hint: Option<String>,
    /// 是否可恢复（可重试）
    pub recoverable: bool,
}

impl ErrorContext {
    /// 创建新的错误上下文
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            recovery_hint: None,
            recoverable: true,
        }
    }

    /// 设置详细信息
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 设置恢复建议
    pub fn with_recovery_hint(mut self, hint: impl Into<String>) -> Self {
        self.recovery_hint = Some(hint.into());
        self
    }

    /// 标记为不可恢复
    pub fn not_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

fn audio_code(err: &AudioError) -> ErrorCode {
    match err {
        AudioError::DeviceNotFound => ErrorCode::AudioDeviceNotFound,
        AudioError::PermissionDenied(_) => ErrorCode::AudioPermissionDenied,
        AudioError::OutputDeviceNotFound => ErrorCode::AudioOutputNotFound,
        AudioError::ResampleFailed(_) => ErrorCode::AudioResampleFailed,
        AudioError::Decode(_) => ErrorCode::PlaybackDecodeFailed,
        _ => ErrorCode::AudioStreamError,
    }
}

fn network_code(err: &NetworkError) -> ErrorCode {
    match err {
        NetworkError::AuthenticationFailed => ErrorCode::NetworkAuthFailed,
        NetworkError::MissingApiKey => ErrorCode::NetworkMissingApiKey,
        NetworkError::ProtocolError(_) | NetworkError::SerializationError(_) => {
            ErrorCode::NetworkProtocolError
        }
        NetworkError::Timeout(_) => ErrorCode::NetworkTimeout,
        NetworkError::ConnectionClosed | NetworkError::ServerError(_) => ErrorCode::NetworkClosed,
        _ => ErrorCode::NetworkConnectionFailed,
    }
}

impl AppError {
    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Audio(e) => audio_code(e),
            AppError::Network(e) => network_code(e),

            AppError::Playback(PlaybackError::Output(e)) => audio_code(e),
            AppError::Playback(_) => ErrorCode::PlaybackDecodeFailed,

            AppError::Config(ConfigError::Json(_)) => ErrorCode::ConfigInvalid,
            AppError::Config(_) => ErrorCode::ConfigLoadFailed,

            AppError::State(_) => ErrorCode::StateInvalidTransition,

            AppError::Session(SessionError::PermissionDenied(_)) => {
                ErrorCode::AudioPermissionDenied
            }
            AppError::Session(SessionError::Audio(e)) => audio_code(e),
            AppError::Session(SessionError::Transport(e)) => network_code(e),
            AppError::Session(SessionError::State(_)) => ErrorCode::StateInvalidTransition,
            AppError::Session(SessionError::Cancelled) => ErrorCode::SessionCancelled,
            AppError::Session(SessionError::Shutdown) => ErrorCode::SessionShutdown,
            AppError::Session(SessionError::Runtime(_)) => ErrorCode::InternalError,

            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 获取用户友好的错误消息
    ///
    /// 返回适合直接显示给用户的错误消息
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::AudioDeviceNotFound => "No microphone found. Check your audio settings.",
            ErrorCode::AudioPermissionDenied => "Microphone access was denied.",
            ErrorCode::AudioOutputNotFound => "No speaker found. Check your audio settings.",
            ErrorCode::AudioStreamError => "Audio device error. Please try again.",
            ErrorCode::AudioResampleFailed => "Audio processing failed. Please try again.",
            ErrorCode::PlaybackDecodeFailed => "Received audio could not be played.",
            ErrorCode::NetworkConnectionFailed => {
                "Could not reach the voice service. Check your connection."
            }
            ErrorCode::NetworkAuthFailed => "The API key was rejected.",
            ErrorCode::NetworkMissingApiKey => "No API key is configured.",
            ErrorCode::NetworkProtocolError => "Unexpected response from the voice service.",
            ErrorCode::NetworkTimeout => "The voice service did not respond in time.",
            ErrorCode::NetworkClosed => "The voice session was disconnected.",
            ErrorCode::ConfigLoadFailed => "Could not read the configuration file.",
            ErrorCode::ConfigInvalid => "The configuration file is invalid.",
            ErrorCode::StateInvalidTransition => "The assistant is busy. Please try again.",
            ErrorCode::SessionCancelled => "The voice session was closed before it connected.",
            ErrorCode::SessionShutdown => "The voice assistant has stopped.",
            ErrorCode::InternalError => "Something went wrong.",
        }
        .to_string()
    }

    /// 获取完整的错误上下文
    pub fn context(&self) -> ErrorContext {
        let mut ctx = ErrorContext::new(self.code(), self.user_message()).with_detail(self.to_string());

        // 添加恢复建议
        ctx.recovery_hint = self.recovery_hint();

        // 某些错误不可恢复
        if !self.is_recoverable() {
            ctx = ctx.not_recoverable();
        }

        ctx
    }

    /// 获取恢复建议
    pub fn recovery_hint(&self) -> Option<String> {
        let hint = match self.code() {
            ErrorCode::AudioDeviceNotFound => {
                "Connect a microphone and select it as the input device"
            }
            ErrorCode::AudioPermissionDenied => {
                "Allow microphone access in your system settings, then retry"
            }
            ErrorCode::NetworkAuthFailed | ErrorCode::NetworkMissingApiKey => {
                "Set GEMINI_API_KEY or update the API key in voice.json"
            }
            ErrorCode::NetworkConnectionFailed
            | ErrorCode::NetworkTimeout
            | ErrorCode::NetworkClosed => "Check your network connection and retry",
            _ => return None,
        };
        Some(hint.to_string())
    }

    /// 检查错误是否可恢复
    ///
    /// 可恢复的错误由用户重新打开会话来重试，不会自动重试
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AppError::Config(_)
                | AppError::Internal(_)
                | AppError::Session(SessionError::Shutdown | SessionError::Runtime(_))
        )
    }

    /// 检查是否是超时错误
    pub fn is_timeout(&self) -> bool {
        self.code() == ErrorCode::NetworkTimeout
    }

    /// 检查是否是认证错误
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::NetworkAuthFailed | ErrorCode::NetworkMissingApiKey
        )
    }

    /// 检查是否是权限错误
    pub fn is_permission_error(&self) -> bool {
        self.code() == ErrorCode::AudioPermissionDenied
    }
}

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::error::DecodeError;

    #[test]
    fn test_error_code() {
        let err = AppError::Audio(AudioError::DeviceNotFound);
        assert_eq!(err.code(), ErrorCode::AudioDeviceNotFound);

        let err = AppError::Network(NetworkError::AuthenticationFailed);
        assert_eq!(err.code(), ErrorCode::NetworkAuthFailed);

        let err = AppError::Playback(PlaybackError::Decode(DecodeError::NoChannels));
        assert_eq!(err.code(), ErrorCode::PlaybackDecodeFailed);
    }

    #[test]
    fn test_session_errors_use_inner_code() {
        let err = AppError::from(SessionError::PermissionDenied(AudioError::PermissionDenied(
            "denied".into(),
        )));
        assert_eq!(err.code(), ErrorCode::AudioPermissionDenied);
        assert!(err.is_permission_error());

        let err = AppError::from(SessionError::Transport(NetworkError::Timeout(15_000)));
        assert_eq!(err.code(), ErrorCode::NetworkTimeout);
        assert!(err.is_timeout());
    }

    #[test]
    fn test_user_message() {
        let err = AppError::Audio(AudioError::DeviceNotFound);
        assert!(err.user_message().contains("microphone"));

        let err = AppError::Network(NetworkError::AuthenticationFailed);
        assert!(err.user_message().contains("API key"));
    }

    #[test]
    fn test_error_context() {
        let err = AppError::Network(NetworkError::MissingApiKey);
        let ctx = err.context();

        assert_eq!(ctx.code, ErrorCode::NetworkMissingApiKey);
        assert!(!ctx.message.is_empty());
        assert!(ctx.detail.is_some());
        assert!(ctx.recovery_hint.unwrap().contains("GEMINI_API_KEY"));
        assert!(ctx.recoverable);
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_recoverable() {
        // 可恢复的错误
        let err = AppError::Network(NetworkError::ConnectionFailed("test".to_string()));
        assert!(err.is_recoverable());

        // 不可恢复的错误
        let err = AppError::Internal("fatal".to_string());
        assert!(!err.is_recoverable());
        assert!(!err.context().recoverable);

        let err = AppError::Session(SessionError::Shutdown);
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_from_string() {
        let err: AppError = "test error".into();
        match err {
            AppError::Internal(msg) => assert_eq!(msg, "test error"),
            _ => panic!("Expected Internal error"),
        }
    }

    #[test]
    fn test_error_code_serialization() {
        let code = ErrorCode::AudioPermissionDenied;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"AUDIO_PERMISSION_DENIED\"");

        let deserialized: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, code);
    }

    #[test]
    fn test_error_context_serialization() {
        let ctx = ErrorContext::new(ErrorCode::NetworkAuthFailed, "Test message")
            .with_detail("Detailed error")
            .with_recovery_hint("Try again");

        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("NETWORK_AUTH_FAILED"));
        assert!(json.contains("Test message"));

        let deserialized: ErrorContext = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.code, ErrorCode::NetworkAuthFailed);
        assert_eq!(deserialized.message, "Test message");
    }
}
