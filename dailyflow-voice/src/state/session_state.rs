use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use serde::Serialize;
use tokio::sync::mpsc;

use super::error::{StateError, StateResult};

/// 监听器通道容量
const LISTENER_CAPACITY: usize = 64;

/// 对话子状态
///
/// 连接建立后，区分助手是在听还是在说
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConversationState {
    /// 监听中，麦克风音频正在上行
    Listening,

    /// 助手正在播放语音
    Speaking,
}

/// 会话主状态
///
/// 表示语音会话的生命周期
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// 空闲，未连接
    Idle,

    /// 正在建立连接，等待服务端确认
    Connecting,

    /// 会话已建立
    Connected(ConversationState),

    /// 错误状态
    Error(String),
}

impl SessionState {
    /// 创建连接状态（监听）
    pub fn listening() -> Self {
        Self::Connected(ConversationState::Listening)
    }

    /// 创建连接状态（说话中）
    pub fn speaking() -> Self {
        Self::Connected(ConversationState::Speaking)
    }

    /// 创建错误状态
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// 检查是否为空闲状态
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// 检查是否在连接中
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// 检查会话是否已建立
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// 检查助手是否在说话
    pub fn is_speaking(&self) -> bool {
        matches!(self, Self::Connected(ConversationState::Speaking))
    }

    /// 检查是否为错误状态
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// 获取对话子状态（如果已连接）
    pub fn conversation(&self) -> Option<ConversationState> {
        match self {
            Self::Connected(conversation) => Some(*conversation),
            _ => None,
        }
    }

    /// 获取错误消息（如果处于错误状态）
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// 获取状态名称（用于日志和调试）
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Connected(ConversationState::Listening) => "Connected::Listening",
            Self::Connected(ConversationState::Speaking) => "Connected::Speaking",
            Self::Error(_) => "Error",
        }
    }

    /// 界面上显示的状态文案
    pub fn status_label(&self) -> &'static str {
        match self {
            Self::Idle => "Ready",
            Self::Connecting => "Connecting...",
            Self::Connected(ConversationState::Listening) => "Listening...",
            Self::Connected(ConversationState::Speaking) => "Assistant is speaking",
            Self::Error(_) => "Connection Failed",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// 状态管理器
///
/// 负责管理会话状态的转换和通知监听者
pub struct StateManager {
    /// 当前状态（使用 ArcSwap 实现无锁读取）
    state: ArcSwap<SessionState>,

    /// 状态变更监听器列表
    listeners: Mutex<Vec<mpsc::Sender<SessionState>>>,
}

impl StateManager {
    /// 创建新的状态管理器
    ///
    /// # Examples
    ///
    /// ```
    /// use dailyflow_voice::state::StateManager;
    ///
    /// let manager = StateManager::new();
    /// assert!(manager.current().is_idle());
    /// ```
    pub fn new() -> Self {
        Self {
            state: ArcSwap::new(Arc::new(SessionState::Idle)),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// 获取当前状态
    ///
    /// 此方法是无锁的，可以在任何线程安全地调用
    pub fn current(&self) -> Arc<SessionState> {
        self.state.load_full()
    }

    /// 转换到新状态
    ///
    /// 验证状态转换的合法性，如果合法则更新状态并通知所有监听者
    ///
    /// # Errors
    ///
    /// 如果状态转换不合法，返回 [`StateError::InvalidTransition`]
    ///
    /// # Examples
    ///
    /// ```
    /// use dailyflow_voice::state::{SessionState, StateManager};
    ///
    /// let manager = StateManager::new();
    ///
    /// // 合法转换
    /// assert!(manager.transition(SessionState::Connecting).is_ok());
    ///
    /// // 非法转换
    /// assert!(manager.transition(SessionState::Connecting).is_err());
    /// ```
    pub fn transition(&self, new_state: SessionState) -> StateResult<()> {
        let current = self.current();

        if !Self::is_valid_transition(&current, &new_state) {
            return Err(StateError::InvalidTransition {
                from: (*current).clone(),
                to: new_state,
            });
        }

        if *current == new_state {
            return Ok(());
        }

        self.state.store(Arc::new(new_state.clone()));
        self.notify_listeners(new_state);

        Ok(())
    }

    /// 添加状态变更监听器
    ///
    /// 返回的接收器按顺序接收之后的每一次状态变更
    pub fn subscribe(&self) -> mpsc::Receiver<SessionState> {
        let (tx, rx) = mpsc::channel(LISTENER_CAPACITY);
        self.lock_listeners().push(tx);
        rx
    }

    /// 移除所有已关闭的监听器
    pub fn cleanup_listeners(&self) {
        self.lock_listeners().retain(|tx| !tx.is_closed());
    }

    /// 获取当前监听器数量
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// 强制设置状态（跳过验证）
    ///
    /// **警告**: 此方法跳过状态转换验证，仅用于错误恢复
    pub fn force_set(&self, new_state: SessionState) {
        let previous = self.state.swap(Arc::new(new_state.clone()));
        if *previous != new_state {
            self.notify_listeners(new_state);
        }
    }

    /// 重置为空闲状态
    pub fn reset(&self) {
        self.force_set(SessionState::Idle);
    }

    /// 通知所有监听者状态变更
    ///
    /// 使用 try_send，不阻塞调用方；已满或已关闭的监听器会错过这次通知
    fn notify_listeners(&self, new_state: SessionState) {
        let mut listeners = self.lock_listeners();
        listeners.retain(|tx| !tx.is_closed());
        for listener in listeners.iter() {
            let _ = listener.try_send(new_state.clone());
        }
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<mpsc::Sender<SessionState>>> {
        // 监听器列表在 panic 后仍然可用
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 验证状态转换是否合法
    pub fn is_valid_transition(from: &SessionState, to: &SessionState) -> bool {
        use SessionState::*;

        match (from, to) {
            // 开始连接（也可以从错误状态重试）
            (Idle, Connecting) => true,
            (Error(_), Connecting) => true,

            // 服务端确认后进入会话
            (Connecting, Connected(_)) => true,

            // 会话内子状态切换
            (Connected(_), Connected(_)) => true,

            // 关闭
            (Connecting, Idle) => true,
            (Connected(_), Idle) => true,
            (Error(_), Idle) => true,

            // 失败
            (Connecting, Error(_)) => true,
            (Connected(_), Error(_)) => true,

            // 其他转换不合法
            _ => false,
        }
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_state_helpers() {
        assert!(SessionState::Idle.is_idle());
        assert!(SessionState::Connecting.is_connecting());

        let listening = SessionState::listening();
        assert!(listening.is_connected());
        assert!(!listening.is_speaking());
        assert_eq!(listening.conversation(), Some(ConversationState::Listening));
        assert_eq!(listening.name(), "Connected::Listening");

        assert!(SessionState::speaking().is_speaking());

        let error = SessionState::error("boom");
        assert!(error.is_error());
        assert_eq!(error.error_message(), Some("boom"));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(SessionState::Connecting.status_label(), "Connecting...");
        assert_eq!(SessionState::listening().status_label(), "Listening...");
        assert_eq!(SessionState::speaking().status_label(), "Assistant is speaking");
        assert_eq!(SessionState::error("x").status_label(), "Connection Failed");
    }

    #[test]
    fn test_valid_lifecycle() {
        let manager = StateManager::new();

        assert!(manager.transition(SessionState::Connecting).is_ok());
        assert!(manager.transition(SessionState::listening()).is_ok());
        assert!(manager.transition(SessionState::speaking()).is_ok());
        assert!(manager.transition(SessionState::listening()).is_ok());
        assert!(manager.transition(SessionState::Idle).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        let manager = StateManager::new();

        let result = manager.transition(SessionState::listening());
        assert!(matches!(result, Err(StateError::InvalidTransition { .. })));

        assert!(manager.transition(SessionState::error("x")).is_err());

        manager.transition(SessionState::Connecting).unwrap();
        assert!(manager.transition(SessionState::Connecting).is_err());
    }

    #[test]
    fn test_retry_from_error() {
        let manager = StateManager::new();
        manager.transition(SessionState::Connecting).unwrap();
        manager.transition(SessionState::error("denied")).unwrap();

        assert!(manager.transition(SessionState::Connecting).is_ok());
    }

    #[test]
    fn test_force_set_and_reset() {
        let manager = StateManager::new();

        manager.force_set(SessionState::speaking());
        assert!(manager.current().is_speaking());

        manager.reset();
        assert!(manager.current().is_idle());
    }

    #[test]
    fn test_listener_receives_changes_in_order() {
        let manager = StateManager::new();
        let mut rx = manager.subscribe();

        manager.transition(SessionState::Connecting).unwrap();
        manager.transition(SessionState::listening()).unwrap();
        // Same state again is not a change
        manager.transition(SessionState::listening()).unwrap();
        manager.transition(SessionState::Idle).unwrap();

        assert_eq!(rx.try_recv().unwrap(), SessionState::Connecting);
        assert_eq!(rx.try_recv().unwrap(), SessionState::listening());
        assert_eq!(rx.try_recv().unwrap(), SessionState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listener_count() {
        let manager = StateManager::new();
        assert_eq!(manager.listener_count(), 0);

        let rx1 = manager.subscribe();
        let _rx2 = manager.subscribe();
        assert_eq!(manager.listener_count(), 2);

        drop(rx1);
        manager.cleanup_listeners();
        assert_eq!(manager.listener_count(), 1);
    }
}
