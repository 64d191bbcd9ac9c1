use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{board::QuestionKey, state_machine::GamePhase};

/// What happened, as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LogKind {
    /// The session moved to a new phase.
    PhaseChanged {
        from: GamePhase,
        to: GamePhase,
        trigger: String,
    },
    /// The host registered a bind intent.
    BindRequested { token: u64, name: String },
    /// An unresolved bind intent was replaced by a newer one.
    BindSuperseded { token: u64, name: String },
    /// A player was committed to a slot.
    PlayerBound {
        slot: u8,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        replaced: Option<String>,
    },
    /// A hardware bind event arrived with no intent pending.
    BindIgnored { slot: u8 },
    /// The first buzz of an armed window.
    BuzzAccepted {
        slot: u8,
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        latency_ms: Option<u64>,
    },
    /// A buzz that arrived after the session left the armed phase.
    BuzzLate {
        slot: u8,
        phase: GamePhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    /// The control board reported a press that lost the race.
    LateNotice {
        slot: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        elapsed_ms: Option<u64>,
    },
    /// A press during the demo phase.
    TestBuzz {
        slot: u8,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// A device event that could not be applied to any player.
    DeviceDropped { code: String, slot: u8, reason: String },
    /// A device line that could not be decoded.
    HardwareUnrecognized { raw: String },
    /// A score changed.
    ScoreChanged { slot: u8, delta: i32, score: i32 },
    /// A question's completion flag changed.
    CompletionChanged {
        question: QuestionKey,
        category: String,
        prompt: String,
        complete: bool,
    },
    /// Buzzers will be re-armed after the cooldown.
    RearmScheduled { delay_ms: u64 },
    /// A pending re-arm was dropped because the phase moved on.
    RearmCancelled,
    /// A command was refused.
    Rejected { command: String, reason: String },
    /// The session was replaced by a persisted snapshot.
    SnapshotRestored { session_id: String },
}

/// One entry of the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Monotonic sequence number, starting at zero.
    pub seq: u64,
    /// Wall-clock time the entry was recorded.
    pub at: SystemTime,
    /// Payload.
    pub kind: LogKind,
}

/// Append-only log of accepted transitions and rejections.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    published: usize,
}

impl EventLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its sequence number.
    pub fn push(&mut self, kind: LogKind) -> u64 {
        let seq = self.entries.len() as u64;
        self.entries.push(LogEntry {
            seq,
            at: SystemTime::now(),
            kind,
        });
        seq
    }

    /// Entries with a sequence number greater or equal to `seq`.
    pub fn since(&self, seq: u64) -> &[LogEntry] {
        let start = usize::try_from(seq)
            .unwrap_or(usize::MAX)
            .min(self.entries.len());
        &self.entries[start..]
    }

    /// Every entry recorded so far.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries appended since the previous call, for streaming to subscribers.
    pub fn take_unpublished(&mut self) -> Vec<LogEntry> {
        let fresh = self.entries[self.published..].to_vec();
        self.published = self.entries.len();
        fresh
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been logged yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
