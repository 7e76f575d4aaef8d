//! 输出命令队列模块
//!
//! 控制线程与音频回调之间的无锁通道
//!
//! # 特性
//!
//! - 单生产者单消费者，基于 ringbuf 的无锁环形缓冲区
//! - 回调线程只做 `try_pop`，不加锁也不分配
//! - 队列满时由生产者返回错误，而不是阻塞
//!
//! # 使用示例
//!
//! ```
//! use dailyflow_voice::audio::buffer::{CommandQueue, OutputCommand};
//!
//! let (mut sender, mut receiver) = CommandQueue::new(16);
//!
//! sender.send(OutputCommand::StopAll).unwrap();
//! assert!(matches!(receiver.pop(), Some(OutputCommand::StopAll)));
//! ```

use crate::audio::error::{AudioError, AudioResult};
use crate::playback::HandleId;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapRb,
};

/// 默认队列容量
pub const DEFAULT_COMMAND_CAPACITY: usize = 256;

/// 一段已排期的语音
///
/// `start_frame` 是输出设备时钟上的绝对帧号，`samples` 已是设备声道交织格式
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledVoice {
    pub id: HandleId,
    pub start_frame: u64,
    pub samples: Vec<f32>,
}

/// 发往音频回调的命令
#[derive(Debug, Clone, PartialEq)]
pub enum OutputCommand {
    /// 在指定帧开始播放
    Play(ScheduledVoice),
    /// 停止全部语音
    StopAll,
}

/// 命令队列构造器
pub struct CommandQueue;

/// 命令发送端（控制线程）
pub struct CommandSender {
    producer: ringbuf::HeapProd<OutputCommand>,
}

/// 命令接收端（音频回调）
pub struct CommandReceiver {
    consumer: ringbuf::HeapCons<OutputCommand>,
}

impl CommandQueue {
    /// 创建新的命令队列
    ///
    /// # Returns
    ///
    /// 返回 (发送端, 接收端) 元组
    pub fn new(capacity: usize) -> (CommandSender, CommandReceiver) {
        let rb = HeapRb::<OutputCommand>::new(capacity.max(1));
        let (producer, consumer) = rb.split();

        (CommandSender { producer }, CommandReceiver { consumer })
    }

    /// 创建默认容量的队列
    pub fn with_default_capacity() -> (CommandSender, CommandReceiver) {
        Self::new(DEFAULT_COMMAND_CAPACITY)
    }
}

impl CommandSender {
    /// 发送命令
    ///
    /// 队列已满时返回 `AudioError::QueueFull`，命令被丢弃
    pub fn send(&mut self, command: OutputCommand) -> AudioResult<()> {
        self.producer
            .try_push(command)
            .map_err(|_| AudioError::QueueFull)
    }

    /// 获取可用写入空间
    pub fn available_space(&self) -> usize {
        self.producer.vacant_len()
    }

    /// 获取队列容量
    pub fn capacity(&self) -> usize {
        self.producer.capacity().get()
    }
}

impl CommandReceiver {
    /// 取出一条命令，队列为空返回 `None`
    pub fn pop(&mut self) -> Option<OutputCommand> {
        self.consumer.try_pop()
    }

    /// 待处理命令数
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }
}
