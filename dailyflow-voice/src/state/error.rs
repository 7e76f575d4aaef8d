use thiserror::Error;

use super::session_state::SessionState;

/// 状态相关错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    /// 无效的状态转换
    #[error("Invalid state transition from {} to {}", from.name(), to.name())]
    InvalidTransition { from: SessionState, to: SessionState },

    /// 监听器已满
    #[error("Listener queue is full")]
    ListenerQueueFull,
}

/// 状态模块的结果类型
pub type StateResult<T> = Result<T, StateError>;
