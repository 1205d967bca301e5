//! Lifecycle state and diagnostic events for a consumer

use std::time::SystemTime;

/// Consumer lifecycle; `Disposed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ConsumerState {
    Running,
    ChannelShutdown,
    Disposed,
}

impl ConsumerState {
    pub fn is_running(self) -> bool {
        self == ConsumerState::Running
    }

    pub fn is_disposed(self) -> bool {
        self == ConsumerState::Disposed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumIter)]
pub enum ConsumerEventType {
    Started,
    Dispatched,
    Acknowledged,
    AckFailed,
    Completed,
    NotHandled,
    Abandoned,
    EndOfStream,
    HandlerMalfunction,
    ChannelShutdown,
    Draining,
    Disposed,
    LoopExited,
}

#[derive(Debug, Clone)]
pub struct ConsumerEvent {
    pub event_type: ConsumerEventType,
    pub timestamp: SystemTime,
    pub consumer_tag: String,
    pub delivery_tag: Option<u64>,
    pub message: Option<String>,
}

impl ConsumerEvent {
    pub fn new(event_type: ConsumerEventType, consumer_tag: String) -> Self {
        Self {
            event_type,
            timestamp: SystemTime::now(),
            consumer_tag,
            delivery_tag: None,
            message: None,
        }
    }

    pub fn for_delivery(event_type: ConsumerEventType, consumer_tag: String, delivery_tag: u64) -> Self {
        Self {
            delivery_tag: Some(delivery_tag),
            ..Self::new(event_type, consumer_tag)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
