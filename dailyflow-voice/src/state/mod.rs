//! 状态管理模块
//!
//! 提供语音会话状态机、状态管理和配置功能
//!
//! # 模块结构
//!
//! - `session_state` - 核心状态定义和状态管理器
//! - `error` - 状态相关错误类型
//! - `transitions` - 会话控制器使用的状态转换封装
//! - `config` - 应用配置的加载与保存

pub mod config;
mod error;
mod session_state;
mod transitions;

pub use config::{
    ApiConfig, AppConfig, AudioConfig, ConfigError, ConfigManager, ConfigResult, GlobalConfig,
    SessionSettings,
};
pub use error::{StateError, StateResult};
pub use session_state::{ConversationState, SessionState, StateManager};
pub use transitions::{StateChangeEvent, StateTransitionContext, TransitionError};
