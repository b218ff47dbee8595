// src/types.rs

// 采集线程发给 GUI 的消息
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    RawSample(f64),
    FilteredSample(f64),
    Error(String),
    Finished,
}

// 会话生命周期
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum SessionState {
    Idle,
    Connecting,
    Running,
    Paused,
    Stopping,
    Finished,
    Failed,
}

impl SessionState {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Connecting
                | SessionState::Running
                | SessionState::Paused
                | SessionState::Stopping
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Connecting => "Connecting",
            SessionState::Running => "Running",
            SessionState::Paused => "Paused",
            SessionState::Stopping => "Stopping",
            SessionState::Finished => "Finished",
            SessionState::Failed => "Failed",
        }
    }
}
