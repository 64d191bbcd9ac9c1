use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    dto::{
        common::{ActiveQuestionSummary, CategorySummary, PlayerSummary},
        format_system_time,
    },
    state::{
        board::{MediaCue, QuestionKind},
        event_log::{LogEntry, LogKind},
        session::{GameSession, MediaState},
        state_machine::GamePhase,
    },
};

/// Full read-only view of the session.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct SessionStateResponse {
    pub session_id: Uuid,
    pub phase: GamePhase,
    /// Bumped on every applied transition.
    pub generation: u64,
    pub players: Vec<PlayerSummary>,
    /// Name waiting for the next hardware bind event.
    pub pending_bind: Option<String>,
    pub active_question: Option<ActiveQuestionSummary>,
    pub buzzed_slot: Option<u8>,
    pub media: MediaState,
    pub rearm_pending: bool,
    pub all_complete: bool,
}

impl From<&GameSession> for SessionStateResponse {
    fn from(session: &GameSession) -> Self {
        let revealed = session.phase() == GamePhase::Answered;
        let active_question = session.active_question().and_then(|(key, question)| {
            session
                .board()
                .category(key)
                .map(|category| ActiveQuestionSummary::new(category, question, revealed))
        });

        Self {
            session_id: session.id(),
            phase: session.phase(),
            generation: session.generation(),
            players: session.players().players().map(Into::into).collect(),
            pending_bind: session.players().pending().map(|pending| pending.name.clone()),
            active_question,
            buzzed_slot: session.buzzed_player().map(|player| player.slot),
            media: session.media(),
            rearm_pending: session.rearm_pending().is_some(),
            all_complete: session.board().all_complete(),
        }
    }
}

/// Categories and question tiles.
#[derive(Debug, Serialize, ToSchema)]
pub struct BoardResponse {
    pub categories: Vec<CategorySummary>,
    pub remaining: usize,
    pub all_complete: bool,
}

impl From<&GameSession> for BoardResponse {
    fn from(session: &GameSession) -> Self {
        let board = session.board();
        Self {
            categories: board.categories().iter().map(Into::into).collect(),
            remaining: board.remaining(),
            all_complete: board.all_complete(),
        }
    }
}

/// Playback instructions for the display.
#[derive(Debug, Serialize, ToSchema)]
pub struct MediaStateResponse {
    pub state: MediaState,
    pub kind: Option<QuestionKind>,
    /// Source to play for the current sub-state.
    pub source: Option<String>,
    pub cue: Option<MediaCue>,
}

impl From<&GameSession> for MediaStateResponse {
    fn from(session: &GameSession) -> Self {
        let state = session.media();
        let Some((_, question)) = session.active_question() else {
            return Self {
                state,
                kind: None,
                source: None,
                cue: None,
            };
        };
        let source = match state {
            MediaState::PlayAnswer => question.answer_media().or(question.prompt_src.as_deref()),
            _ => question.prompt_src.as_deref(),
        };
        Self {
            state,
            kind: Some(question.kind),
            source: source.map(str::to_string),
            cue: question.cue,
        }
    }
}

/// Query of `GET /public/log`.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LogQuery {
    /// First sequence number to return.
    #[serde(default)]
    pub since: u64,
}

/// One audit log entry.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct LogEntryDto {
    pub seq: u64,
    /// RFC 3339 timestamp.
    pub at: String,
    pub event: LogKind,
}

impl From<&LogEntry> for LogEntryDto {
    fn from(entry: &LogEntry) -> Self {
        Self {
            seq: entry.seq,
            at: format_system_time(entry.at),
            event: entry.kind.clone(),
        }
    }
}

/// Page of the audit log.
#[derive(Debug, Serialize, ToSchema)]
pub struct LogResponse {
    pub entries: Vec<LogEntryDto>,
    /// Sequence number to pass as `since` to fetch what comes next.
    pub next: u64,
}
