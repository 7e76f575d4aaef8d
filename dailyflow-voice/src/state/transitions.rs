//! 状态转换封装模块
//!
//! 提供会话控制器使用的状态转换接口：
//! - 状态变更事件载荷（供界面绑定）
//! - 会话生命周期的统一转换方法

use std::sync::Arc;

use serde::Serialize;

use super::{ConversationState, SessionState, StateManager};

/// 状态变更事件载荷
///
/// 用于发送给界面的状态变更通知
#[derive(Debug, Clone, Serialize)]
pub struct StateChangeEvent {
    /// 状态名称
    pub state: String,
    /// 界面文案
    pub label: String,
    /// 是否空闲
    pub is_idle: bool,
    /// 是否连接中
    pub is_connecting: bool,
    /// 是否已连接
    pub is_connected: bool,
    /// 助手是否在说话
    pub is_speaking: bool,
    /// 是否错误状态
    pub is_error: bool,
    /// 错误消息（如果有）
    pub error_message: Option<String>,
}

impl From<&SessionState> for StateChangeEvent {
    fn from(state: &SessionState) -> Self {
        Self {
            state: state.name().to_string(),
            label: state.status_label().to_string(),
            is_idle: state.is_idle(),
            is_connecting: state.is_connecting(),
            is_connected: state.is_connected(),
            is_speaking: state.is_speaking(),
            is_error: state.is_error(),
            error_message: state.error_message().map(|s| s.to_string()),
        }
    }
}

/// 状态转换上下文
///
/// 会话控制器通过它驱动状态机
#[derive(Clone)]
pub struct StateTransitionContext {
    state_manager: Arc<StateManager>,
}

impl StateTransitionContext {
    /// 创建状态转换上下文
    pub fn new(state_manager: Arc<StateManager>) -> Self {
        Self { state_manager }
    }

    /// 获取底层状态管理器
    pub fn state_manager(&self) -> &Arc<StateManager> {
        &self.state_manager
    }

    /// 获取当前状态
    pub fn current(&self) -> Arc<SessionState> {
        self.state_manager.current()
    }

    /// 开始连接
    ///
    /// 从 Idle 或 Error 转换到 Connecting
    pub fn begin_connecting(&self) -> Result<(), TransitionError> {
        self.transition(SessionState::Connecting)
    }

    /// 服务端确认，进入会话
    ///
    /// 从 Connecting 转换到 Connected(Listening)
    pub fn mark_connected(&self) -> Result<(), TransitionError> {
        self.transition(SessionState::listening())
    }

    /// 切换说话/监听子状态
    ///
    /// 仅在已连接时生效，返回是否发生了切换
    pub fn set_speaking(&self, speaking: bool) -> bool {
        let target = if speaking {
            ConversationState::Speaking
        } else {
            ConversationState::Listening
        };

        match self.current().conversation() {
            Some(current) if current != target => self
                .transition(SessionState::Connected(target))
                .is_ok(),
            _ => false,
        }
    }

    /// 报告错误
    ///
    /// 转换到 Error 状态；当前状态不允许时强制设置
    pub fn report_error(&self, message: impl Into<String>) {
        let error = SessionState::error(message);
        if let Err(e) = self.state_manager.transition(error.clone()) {
            tracing::debug!(error = %e, "Forcing error state");
            self.state_manager.force_set(error);
        }
    }

    /// 完成，回到空闲
    ///
    /// 从任何状态重置到 Idle
    pub fn complete(&self) {
        self.state_manager.reset();
    }

    /// 执行状态转换
    fn transition(&self, new_state: SessionState) -> Result<(), TransitionError> {
        self.state_manager
            .transition(new_state)
            .map_err(|e| TransitionError::TransitionFailed(e.to_string()))
    }
}

/// 状态转换错误
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TransitionError {
    /// 状态转换失败
    #[error("State transition failed: {0}")]
    TransitionFailed(String),
}
