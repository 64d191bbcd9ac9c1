//! Authoritative session aggregate.
//!
//! Every mutating operation validates first and only then touches state, so a rejected
//! command leaves the session exactly as it was. Side effects for the control board are
//! queued as [`DeviceDirective`]s and drained by the arbiter after each operation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::state::{
    board::{Board, LookupError, Question, QuestionKey},
    device::{DeviceDirective, DeviceEvent},
    event_log::{EventLog, LogEntry, LogKind},
    players::{BindToken, PendingBind, Player, PlayerRegistry, RegistryError, Rgb},
    state_machine::{GameEvent, GamePhase, GameStateMachine, InvalidTransition, Plan},
};

/// Failures of session operations. None of them is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    IllegalTransition(#[from] InvalidTransition),
}

impl From<RegistryError> for GameError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownSlot(_) => GameError::NotFound(err.to_string()),
            _ => GameError::InvalidInput(err.to_string()),
        }
    }
}

impl From<LookupError> for GameError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::UnknownCategory(_) | LookupError::UnknownQuestion { .. } => {
                GameError::NotFound(err.to_string())
            }
            LookupError::AmbiguousCategory(_) | LookupError::AmbiguousQuestion { .. } => {
                GameError::InvalidInput(err.to_string())
            }
        }
    }
}

/// Playback progress of a video/audio question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaState {
    #[default]
    Initial,
    PlayQuestion,
    PlayAnswer,
}

/// Tunables taken from the application config.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Number of physical buzzer slots; events for higher slots are dropped.
    pub slots: u8,
    /// Indicator colour of slots without a player.
    pub default_colour: Rgb,
    /// Cooldown between a wrong answer and the automatic re-arm.
    pub rearm_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            slots: 8,
            default_colour: Rgb::WHITE,
            rearm_delay: Duration::from_millis(4_000),
        }
    }
}

/// How a device event was arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arbitration {
    /// The event changed the session (or re-armed the demo).
    Applied,
    /// The event was logged and discarded.
    Dropped,
}

/// Serializable image of the whole session, used by the snapshot store.
///
/// Invariants are checked by [`GameSession::restore`], not by `validator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
pub struct SessionSnapshot {
    /// Session identifier, also the snapshot key.
    pub id: Uuid,
    pub phase: GamePhase,
    /// Board including completion flags.
    #[schema(value_type = Vec<crate::state::board::Category>)]
    pub board: Board,
    pub players: Vec<Player>,
    #[serde(default)]
    pub pending_bind: Option<PendingBind>,
    /// Bind tokens handed out so far; restored sessions never reuse one.
    #[serde(default)]
    pub issued_bind_tokens: u64,
    #[serde(default)]
    pub active_question: Option<QuestionKey>,
    #[serde(default)]
    pub buzzed_slot: Option<u8>,
    #[serde(default)]
    pub media: MediaState,
    /// A wrong answer was given and buzzers are waiting for the cooldown re-arm.
    #[serde(default)]
    pub rearm_pending: bool,
}

/// The single mutable root of the game.
#[derive(Debug)]
pub struct GameSession {
    id: Uuid,
    settings: SessionSettings,
    board: Board,
    players: PlayerRegistry,
    machine: GameStateMachine,
    active: Option<QuestionKey>,
    buzzed: Option<u8>,
    media: MediaState,
    armed_at: Option<Instant>,
    rearm: Option<u64>,
    log: EventLog,
    outbox: Vec<DeviceDirective>,
}

impl GameSession {
    /// Fresh session in [`GamePhase::Setup`] over a loaded board.
    pub fn new(board: Board, settings: SessionSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            settings,
            board,
            players: PlayerRegistry::new(),
            machine: GameStateMachine::new(),
            active: None,
            buzzed: None,
            media: MediaState::Initial,
            armed_at: None,
            rearm: None,
            log: EventLog::new(),
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    pub fn generation(&self) -> u64 {
        self.machine.generation()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn media(&self) -> MediaState {
        self.media
    }

    /// Active question with its key, if any.
    pub fn active_question(&self) -> Option<(QuestionKey, &Question)> {
        let key = self.active?;
        self.board.question(key).map(|question| (key, question))
    }

    /// Player currently answering.
    pub fn buzzed_player(&self) -> Option<&Player> {
        self.buzzed.and_then(|slot| self.players.find(slot))
    }

    /// Generation a scheduled re-arm is waiting for, if any.
    pub fn rearm_pending(&self) -> Option<u64> {
        self.rearm
    }

    /// Directives queued by the previous operations.
    pub fn take_directives(&mut self) -> Vec<DeviceDirective> {
        std::mem::take(&mut self.outbox)
    }

    /// Log entries not yet streamed to subscribers.
    pub fn take_log_updates(&mut self) -> Vec<LogEntry> {
        self.log.take_unpublished()
    }

    /// Indicator colour of every physical slot.
    pub fn indicator_directives(&self) -> Vec<DeviceDirective> {
        (0..self.settings.slots)
            .map(|slot| DeviceDirective::SetColour {
                slot,
                colour: self
                    .players
                    .find(slot)
                    .map_or(self.settings.default_colour, |player| player.colour),
            })
            .collect()
    }

    /// Directives bringing a freshly connected control board in sync.
    pub fn connect_directives(&self) -> Vec<DeviceDirective> {
        let mut directives = vec![DeviceDirective::Reset];
        directives.extend(self.indicator_directives());
        if self.phase() == GamePhase::Armed || self.phase() == GamePhase::Demo {
            directives.push(DeviceDirective::Arm);
        }
        directives
    }

    // ------------------------------------------------------------------
    // Host commands
    // ------------------------------------------------------------------

    /// Record the intent to bind the next buzzer that reports a bind event.
    pub fn register_bind(&mut self, name: &str, colour: &str) -> Result<BindToken, GameError> {
        self.guarded("register_bind", |session| {
            let (token, superseded) = session.players.bind(name, colour)?;
            if let Some(previous) = superseded {
                info!(token = previous.token.0, name = %previous.name, "bind intent superseded");
                session.log.push(LogKind::BindSuperseded {
                    token: previous.token.0,
                    name: previous.name,
                });
            }
            let name = session
                .players
                .pending()
                .map(|pending| pending.name.clone())
                .unwrap_or_default();
            info!(token = token.0, %name, "bind intent registered");
            session.log.push(LogKind::BindRequested {
                token: token.0,
                name,
            });
            Ok(token)
        })
    }

    /// Arm the buzzers for a test round.
    pub fn start_demo(&mut self, now: Instant) -> Result<GamePhase, GameError> {
        self.guarded("start_demo", |session| {
            let plan = session.machine.plan(GameEvent::StartDemo)?;
            let phase = session.commit(plan, "start_demo");
            session.armed_at = Some(now);
            session.outbox.push(DeviceDirective::Reset);
            session.outbox.push(DeviceDirective::Arm);
            Ok(phase)
        })
    }

    /// Leave the demo round.
    pub fn stop_demo(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("stop_demo", |session| {
            let plan = session.machine.plan(GameEvent::StopDemo)?;
            let phase = session.commit(plan, "stop_demo");
            session.armed_at = None;
            session.outbox.push(DeviceDirective::Reset);
            Ok(phase)
        })
    }

    /// (Re)start the game on the selection board. Completion flags are kept.
    pub fn start_game(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("start_game", |session| {
            let plan = session.machine.plan(GameEvent::StartGame)?;
            let phase = session.commit(plan, "start_game");
            session.clear_question();
            session.armed_at = None;
            session.outbox.push(DeviceDirective::Reset);
            let colours = session.indicator_directives();
            session.outbox.extend(colours);
            Ok(phase)
        })
    }

    /// Open a question. While a question is already active this closes it instead.
    pub fn select_question(&mut self, category: &str, prompt: &str) -> Result<GamePhase, GameError> {
        self.guarded("select_question", |session| {
            if session.phase().has_active_question() {
                return session.close_active("select_question");
            }

            let plan = session.machine.plan(GameEvent::SelectQuestion)?;
            let key = session.board.locate(category, prompt)?;
            let replay_allowed = plan.from == GamePhase::Tiebreak;
            if session.board.question(key).is_some_and(|q| q.complete) && !replay_allowed {
                return Err(InvalidTransition::because(
                    plan.from,
                    plan.event,
                    "question already complete",
                )
                .into());
            }

            let phase = session.commit(plan, "select_question");
            session.active = Some(key);
            session.buzzed = None;
            session.media = MediaState::Initial;
            info!(category, prompt, "question selected");
            Ok(phase)
        })
    }

    /// Close the active question, marking it complete.
    pub fn unselect_current(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("unselect_current", |session| session.close_active("unselect_current"))
    }

    /// Arm the buzzers for the active question.
    pub fn activate_buzzers(&mut self, now: Instant) -> Result<GamePhase, GameError> {
        self.guarded("activate_buzzers", |session| {
            let plan = session.machine.plan(GameEvent::ActivateBuzzers)?;
            let phase = session.commit(plan, "activate_buzzers");
            session.arm(now);
            Ok(phase)
        })
    }

    /// Reveal the answer of the active question.
    pub fn show_answer(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("show_answer", |session| {
            let plan = session.machine.plan(GameEvent::ShowAnswer)?;
            let timed = session.require_active(&plan)?.1.kind.is_timed_media();
            let phase = session.commit(plan, "show_answer");
            if timed {
                session.media = MediaState::PlayAnswer;
            }
            Ok(phase)
        })
    }

    /// Score the buzzed player's answer.
    ///
    /// A correct answer closes the question. A wrong one removes the reward and schedules
    /// the re-arm after the cooldown; the phase only changes when the re-arm fires.
    pub fn answer_response(&mut self, correct: bool) -> Result<GamePhase, GameError> {
        let command = "answer_response";
        self.guarded(command, |session| {
            let event = if correct {
                GameEvent::AnswerCorrect
            } else {
                GameEvent::AnswerIncorrect
            };
            let plan = session.machine.plan(event)?;
            let slot = session.buzzed.ok_or_else(|| {
                InvalidTransition::because(plan.from, plan.event, "no player has buzzed")
            })?;
            let (key, question) = session.require_active(&plan)?;
            let reward = i32::try_from(question.reward).unwrap_or(i32::MAX);
            let delta = if correct { reward } else { -reward };

            let score = session.players.adjust_score(slot, delta)?;
            session.log.push(LogKind::ScoreChanged { slot, delta, score });
            info!(slot, delta, score, correct, "answer scored");

            if correct {
                session.mark_complete(key, true);
                let phase = session.commit(plan, command);
                session.clear_question();
                session.outbox.push(DeviceDirective::Signal { correct: true });
                session.outbox.push(DeviceDirective::Reset);
                Ok(phase)
            } else {
                let phase = session.commit(plan, command);
                session.buzzed = None;
                session.rearm = Some(session.machine.generation());
                let delay_ms = duration_ms(session.settings.rearm_delay);
                debug!(delay_ms, generation = session.machine.generation(), "re-arm scheduled");
                session.log.push(LogKind::RearmScheduled { delay_ms });
                session.outbox.push(DeviceDirective::Signal { correct: false });
                Ok(phase)
            }
        })
    }

    /// Force the completion flag of any question. Never changes the phase.
    pub fn override_completion(
        &mut self,
        category: &str,
        prompt: &str,
        complete: bool,
    ) -> Result<GamePhase, GameError> {
        self.guarded("override_completion", |session| {
            let key = session.board.locate(category, prompt)?;
            session.mark_complete(key, complete);
            Ok(session.phase())
        })
    }

    /// Manual score correction; returns the new score.
    pub fn adjust_score(&mut self, slot: u8, delta: i32) -> Result<i32, GameError> {
        self.guarded("adjust_score", |session| {
            let score = session.players.adjust_score(slot, delta)?;
            info!(slot, delta, score, "score adjusted by host");
            session.log.push(LogKind::ScoreChanged { slot, delta, score });
            Ok(score)
        })
    }

    /// Close the game.
    pub fn finish_game(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("finish_game", |session| {
            let plan = session.machine.plan(GameEvent::FinishGame)?;
            if !session.board.all_complete() {
                warn!(remaining = session.board.remaining(), "finishing with questions left");
            }
            let phase = session.commit(plan, "finish_game");
            session.outbox.push(DeviceDirective::Reset);
            Ok(phase)
        })
    }

    /// Enter a tiebreak round where played questions may be selected again.
    pub fn start_tiebreak(&mut self) -> Result<GamePhase, GameError> {
        self.guarded("start_tiebreak", |session| {
            let plan = session.machine.plan(GameEvent::StartTiebreak)?;
            Ok(session.commit(plan, "start_tiebreak"))
        })
    }

    // ------------------------------------------------------------------
    // Hardware events
    // ------------------------------------------------------------------

    /// Apply an event from the control board. `arrived` is taken when the line was read.
    pub fn handle_device_event(&mut self, event: DeviceEvent, arrived: Instant) -> Arbitration {
        let slot = event.slot();
        if slot >= self.settings.slots {
            return self.drop_device_event(event, "slot out of range");
        }

        match event {
            DeviceEvent::Bind { slot } => self.resolve_bind(slot),
            DeviceEvent::Buzz { slot } => match self.machine.plan(GameEvent::Buzz { slot }) {
                Ok(plan) => self.accept_buzz(plan, slot, arrived),
                Err(InvalidTransition {
                    from: GamePhase::Demo,
                    ..
                }) => {
                    let name = self.players.find(slot).map(|player| player.name.clone());
                    info!(slot, name = ?name, "test buzz");
                    self.log.push(LogKind::TestBuzz { slot, name });
                    self.outbox.push(DeviceDirective::Arm);
                    Arbitration::Applied
                }
                Err(InvalidTransition { from, .. }) => {
                    let elapsed_ms = self.since_armed(arrived);
                    debug!(slot, phase = ?from, elapsed_ms, "buzz outside armed window");
                    self.log.push(LogKind::BuzzLate {
                        slot,
                        phase: from,
                        elapsed_ms,
                    });
                    Arbitration::Dropped
                }
            },
            DeviceEvent::LateBuzz { slot } => {
                let elapsed_ms = self.since_armed(arrived);
                debug!(slot, elapsed_ms, "late buzz notice");
                self.log.push(LogKind::LateNotice { slot, elapsed_ms });
                Arbitration::Dropped
            }
        }
    }

    /// Log a host command refused before it reached the session, e.g. a malformed body.
    pub fn record_rejection(&mut self, command: &str, reason: &str) {
        warn!(command, phase = ?self.phase(), reason, "command rejected");
        self.log.push(LogKind::Rejected {
            command: command.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Record a line the device codec could not decode.
    pub fn handle_unrecognized(&mut self, raw: &str) {
        warn!(raw, "unrecognized device event dropped");
        self.log.push(LogKind::HardwareUnrecognized {
            raw: raw.to_string(),
        });
    }

    /// Deferred re-arm after a wrong answer. Returns `false` when the session moved on.
    pub fn fire_rearm(&mut self, generation: u64, now: Instant) -> bool {
        if self.rearm != Some(generation) || self.machine.generation() != generation {
            debug!(generation, current = self.machine.generation(), "stale re-arm ignored");
            return false;
        }
        self.rearm = None;
        let plan = match self.machine.plan(GameEvent::Rearm) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "re-arm no longer applicable");
                return false;
            }
        };
        self.commit(plan, "rearm");
        self.arm(now);
        true
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Serializable image of the current state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            phase: self.phase(),
            board: self.board.clone(),
            players: self.players.players().cloned().collect(),
            pending_bind: self.players.pending().cloned(),
            issued_bind_tokens: self.players.issued_tokens(),
            active_question: self.active,
            buzzed_slot: self.buzzed,
            media: self.media,
            rearm_pending: self.rearm.is_some(),
        }
    }

    /// Replace the session with `snapshot` after checking its invariants.
    ///
    /// The event log and settings survive; indicator colours are re-issued.
    pub fn restore(&mut self, snapshot: SessionSnapshot) -> Result<GamePhase, GameError> {
        self.guarded("restore", |session| {
            session.validate_snapshot(&snapshot)?;
            let issued_tokens = session
                .players
                .issued_tokens()
                .max(snapshot.issued_bind_tokens);
            let players =
                PlayerRegistry::restore(snapshot.players, snapshot.pending_bind, issued_tokens)?;

            let from = session.phase();
            session.id = snapshot.id;
            session.board = snapshot.board;
            session.players = players;
            session.machine =
                GameStateMachine::resume(snapshot.phase, session.machine.generation() + 1);
            session.active = snapshot.active_question;
            session.buzzed = snapshot.buzzed_slot;
            session.media = snapshot.media;
            session.armed_at = None;
            session.rearm = snapshot
                .rearm_pending
                .then(|| session.machine.generation());

            info!(session_id = %session.id, phase = ?snapshot.phase, "session restored");
            session.log.push(LogKind::SnapshotRestored {
                session_id: session.id.to_string(),
            });
            if from != snapshot.phase {
                session.log.push(LogKind::PhaseChanged {
                    from,
                    to: snapshot.phase,
                    trigger: "restore".into(),
                });
            }
            if session.rearm.is_some() {
                session.log.push(LogKind::RearmScheduled {
                    delay_ms: duration_ms(session.settings.rearm_delay),
                });
            }
            let directives = session.connect_directives();
            session.outbox.extend(directives);
            Ok(snapshot.phase)
        })
    }

    fn validate_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), GameError> {
        let invalid = |reason: &str| Err(GameError::InvalidInput(format!("snapshot: {reason}")));
        let phase = snapshot.phase;

        if let Some(player) = snapshot
            .players
            .iter()
            .find(|player| player.slot >= self.settings.slots)
        {
            return invalid(&format!("slot {} is out of range", player.slot));
        }
        match snapshot.active_question {
            Some(key) if !phase.has_active_question() || snapshot.board.question(key).is_none() => {
                return invalid("active question does not fit the phase or board");
            }
            None if phase.has_active_question() => {
                return invalid("phase requires an active question");
            }
            None if snapshot.media != MediaState::Initial => {
                return invalid("media playing without an active question");
            }
            _ => {}
        }
        if let Some(slot) = snapshot.buzzed_slot {
            if !phase.allows_buzzed_player() {
                return invalid("buzzed player outside buzzed/answered");
            }
            if snapshot.players.iter().all(|player| player.slot != slot) {
                return invalid("buzzed slot is not bound");
            }
        }
        if snapshot.rearm_pending && (!phase.allows_buzzed_player() || snapshot.buzzed_slot.is_some())
        {
            return invalid("pending re-arm outside the cooldown window");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run `op`, logging it as rejected when it fails.
    fn guarded<T>(
        &mut self,
        command: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let result = op(self);
        if let Err(err) = &result {
            self.record_rejection(command, &err.to_string());
        }
        result
    }

    /// Apply a validated plan. Any pending re-arm is dropped since the generation moves on.
    fn commit(&mut self, plan: Plan, trigger: &str) -> GamePhase {
        if let Some(generation) = self.rearm.take() {
            debug!(generation, trigger, "pending re-arm cancelled");
            self.log.push(LogKind::RearmCancelled);
        }
        let phase = self.machine.apply(plan);
        if plan.from != plan.to {
            info!(from = ?plan.from, to = ?plan.to, trigger, "phase changed");
            self.log.push(LogKind::PhaseChanged {
                from: plan.from,
                to: plan.to,
                trigger: trigger.to_string(),
            });
        }
        phase
    }

    fn close_active(&mut self, trigger: &str) -> Result<GamePhase, GameError> {
        let plan = self.machine.plan(GameEvent::Unselect)?;
        let (key, _) = self.require_active(&plan)?;
        self.mark_complete(key, true);
        let phase = self.commit(plan, trigger);
        self.clear_question();
        self.outbox.push(DeviceDirective::Reset);
        Ok(phase)
    }

    fn require_active(&self, plan: &Plan) -> Result<(QuestionKey, &Question), GameError> {
        self.active_question().ok_or_else(|| {
            InvalidTransition::because(plan.from, plan.event, "no active question").into()
        })
    }

    fn clear_question(&mut self) {
        self.active = None;
        self.buzzed = None;
        self.media = MediaState::Initial;
    }

    fn arm(&mut self, now: Instant) {
        self.buzzed = None;
        self.armed_at = Some(now);
        if self
            .active_question()
            .is_some_and(|(_, question)| question.kind.is_timed_media())
        {
            self.media = MediaState::PlayQuestion;
        }
        self.outbox.push(DeviceDirective::Arm);
    }

    fn mark_complete(&mut self, key: QuestionKey, complete: bool) {
        if !self.board.set_complete(key, complete) {
            return;
        }
        let (category, prompt) = match (self.board.category(key), self.board.question(key)) {
            (Some(category), Some(question)) => (category.title.clone(), question.prompt.clone()),
            _ => return,
        };
        info!(%category, %prompt, complete, "question completion changed");
        self.log.push(LogKind::CompletionChanged {
            question: key,
            category,
            prompt,
            complete,
        });
    }

    fn resolve_bind(&mut self, slot: u8) -> Arbitration {
        let Some(outcome) = self.players.resolve_bind(slot) else {
            debug!(slot, "bind event without pending intent");
            self.log.push(LogKind::BindIgnored { slot });
            return Arbitration::Dropped;
        };
        let replaced = outcome.replaced.map(|previous| previous.name);
        if let Some(previous) = &replaced {
            warn!(slot, previous = %previous, name = %outcome.player.name, "slot occupant overwritten");
        } else {
            info!(slot, name = %outcome.player.name, "player bound");
        }
        self.log.push(LogKind::PlayerBound {
            slot,
            name: outcome.player.name.clone(),
            replaced,
        });
        self.outbox.push(DeviceDirective::SetColour {
            slot,
            colour: outcome.player.colour,
        });
        Arbitration::Applied
    }

    fn accept_buzz(&mut self, plan: Plan, slot: u8, arrived: Instant) -> Arbitration {
        let Some(name) = self.players.find(slot).map(|player| player.name.clone()) else {
            return self.drop_device_event(DeviceEvent::Buzz { slot }, "no player bound to slot");
        };
        self.commit(plan, "buzz");
        self.buzzed = Some(slot);
        let latency_ms = self.since_armed(arrived);
        info!(slot, %name, latency_ms, "buzz accepted");
        self.log.push(LogKind::BuzzAccepted {
            slot,
            name,
            latency_ms,
        });
        Arbitration::Applied
    }

    fn drop_device_event(&mut self, event: DeviceEvent, reason: &str) -> Arbitration {
        warn!(code = %event.code(), slot = event.slot(), reason, "device event dropped");
        self.log.push(LogKind::DeviceDropped {
            code: event.code().to_string(),
            slot: event.slot(),
            reason: reason.to_string(),
        });
        Arbitration::Dropped
    }

    fn since_armed(&self, at: Instant) -> Option<u64> {
        self.armed_at
            .map(|armed| duration_ms(at.saturating_duration_since(armed)))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::tests::sample_board;

    const HISTORY: &str = "History";
    const MOON: &str = "Year of the moon landing?";
    const EMPEROR: &str = "First emperor?";

    fn session() -> GameSession {
        GameSession::new(sample_board(), SessionSettings::default())
    }

    fn bind(session: &mut GameSession, name: &str, colour: &str, slot: u8) {
        session.register_bind(name, colour).unwrap();
        assert_eq!(
            session.handle_device_event(DeviceEvent::Bind { slot }, Instant::now()),
            Arbitration::Applied
        );
    }

    /// Session with players at slots 2 and 5, armed on the moon landing question.
    fn armed_session() -> GameSession {
        let mut session = session();
        bind(&mut session, "Ada", "#ff0000", 2);
        bind(&mut session, "Grace", "#0000ff", 5);
        session.start_game().unwrap();
        session.select_question(HISTORY, MOON).unwrap();
        session.activate_buzzers(Instant::now()).unwrap();
        session.take_directives();
        session
    }

    fn last_kind(session: &GameSession) -> &LogKind {
        &session.log().entries().last().unwrap().kind
    }

    #[test]
    fn first_buzz_wins_and_later_ones_are_logged_late() {
        let mut session = armed_session();
        let armed = Instant::now();

        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, armed),
            Arbitration::Applied
        );
        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 5 }, armed),
            Arbitration::Dropped
        );

        assert_eq!(session.phase(), GamePhase::Buzzed);
        assert_eq!(session.buzzed_player().unwrap().name, "Ada");
        assert!(matches!(
            last_kind(&session),
            LogKind::BuzzLate {
                slot: 5,
                phase: GamePhase::Buzzed,
                ..
            }
        ));
    }

    #[test]
    fn buzz_from_unbound_slot_is_dropped() {
        let mut session = armed_session();
        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 7 }, Instant::now()),
            Arbitration::Dropped
        );
        assert_eq!(session.phase(), GamePhase::Armed);
        assert!(matches!(last_kind(&session), LogKind::DeviceDropped { slot: 7, .. }));
    }

    #[test]
    fn out_of_range_slot_is_dropped() {
        let mut session = armed_session();
        session.register_bind("Linus", "#00ff00").unwrap();
        assert_eq!(
            session.handle_device_event(DeviceEvent::Bind { slot: 8 }, Instant::now()),
            Arbitration::Dropped
        );
        assert!(session.players().pending().is_some());
    }

    #[test]
    fn rebind_overwrites_occupant_and_updates_colour() {
        let mut session = armed_session();
        session.adjust_score(2, 150).unwrap();
        session.register_bind("Linus", "#00ff00").unwrap();
        session.handle_device_event(DeviceEvent::Bind { slot: 2 }, Instant::now());

        let player = session.players().find(2).unwrap();
        assert_eq!(player.name, "Linus");
        assert_eq!(player.score, 150);
        assert_eq!(
            session.take_directives(),
            vec![DeviceDirective::SetColour {
                slot: 2,
                colour: "#00ff00".parse().unwrap()
            }]
        );
        assert!(matches!(
            last_kind(&session),
            LogKind::PlayerBound { replaced: Some(previous), .. } if previous == "Ada"
        ));
    }

    #[test]
    fn bind_event_without_intent_is_ignored() {
        let mut session = session();
        assert_eq!(
            session.handle_device_event(DeviceEvent::Bind { slot: 1 }, Instant::now()),
            Arbitration::Dropped
        );
        assert!(session.players().is_empty());
        assert_eq!(last_kind(&session), &LogKind::BindIgnored { slot: 1 });
    }

    #[test]
    fn invalid_bind_is_rejected_without_state_change() {
        let mut session = session();
        assert!(matches!(
            session.register_bind("", "#ff0000"),
            Err(GameError::InvalidInput(_))
        ));
        assert!(matches!(
            session.register_bind("Ada", "not a colour"),
            Err(GameError::InvalidInput(_))
        ));
        assert!(session.players().pending().is_none());
        assert!(matches!(last_kind(&session), LogKind::Rejected { .. }));
    }

    #[test]
    fn correct_answer_rewards_and_closes_question() {
        let mut session = armed_session();
        session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, Instant::now());
        session.take_directives();

        assert_eq!(session.answer_response(true), Ok(GamePhase::Selection));
        assert_eq!(session.players().find(2).unwrap().score, 100);
        assert!(session.board().categories()[0].questions[0].complete);
        assert!(session.buzzed_player().is_none());
        assert!(session.active_question().is_none());
        assert_eq!(
            session.take_directives(),
            vec![DeviceDirective::Signal { correct: true }, DeviceDirective::Reset]
        );
    }

    #[test]
    fn wrong_answer_penalises_and_waits_for_rearm() {
        let mut session = armed_session();
        session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, Instant::now());
        session.take_directives();

        assert_eq!(session.answer_response(false), Ok(GamePhase::Buzzed));
        assert_eq!(session.players().find(2).unwrap().score, -100);
        assert!(session.buzzed_player().is_none());
        let generation = session.rearm_pending().unwrap();
        assert_eq!(generation, session.generation());
        assert_eq!(
            session.take_directives(),
            vec![DeviceDirective::Signal { correct: false }]
        );

        // still cooling down: buzzes are dropped, a second verdict is refused
        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 5 }, Instant::now()),
            Arbitration::Dropped
        );
        assert!(matches!(
            session.answer_response(false),
            Err(GameError::IllegalTransition(InvalidTransition {
                reason: Some("no player has buzzed"),
                ..
            }))
        ));
        assert_eq!(session.players().find(2).unwrap().score, -100);

        assert!(session.fire_rearm(generation, Instant::now()));
        assert_eq!(session.phase(), GamePhase::Armed);
        assert_eq!(session.take_directives(), vec![DeviceDirective::Arm]);
        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 5 }, Instant::now()),
            Arbitration::Applied
        );
        assert_eq!(session.buzzed_player().unwrap().name, "Grace");
    }

    #[test]
    fn stale_rearm_is_ignored_after_phase_change() {
        let mut session = armed_session();
        session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, Instant::now());
        session.answer_response(false).unwrap();
        let generation = session.rearm_pending().unwrap();

        session.select_question(HISTORY, MOON).unwrap();
        assert_eq!(session.phase(), GamePhase::Selection);
        assert!(session.rearm_pending().is_none());
        assert!(!session.fire_rearm(generation, Instant::now()));
        assert_eq!(session.phase(), GamePhase::Selection);
    }

    #[test]
    fn show_answer_during_cooldown_cancels_rearm() {
        let mut session = armed_session();
        session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, Instant::now());
        session.answer_response(false).unwrap();

        assert_eq!(session.show_answer(), Ok(GamePhase::Answered));
        assert!(session.rearm_pending().is_none());
        assert!(session
            .log()
            .entries()
            .iter()
            .any(|entry| entry.kind == LogKind::RearmCancelled));
    }

    #[test]
    fn show_answer_without_question_is_rejected() {
        let mut session = session();
        session.start_game().unwrap();
        let generation = session.generation();

        assert!(matches!(
            session.show_answer(),
            Err(GameError::IllegalTransition(InvalidTransition {
                from: GamePhase::Selection,
                ..
            }))
        ));
        assert_eq!(session.phase(), GamePhase::Selection);
        assert_eq!(session.generation(), generation);
    }

    #[test]
    fn select_question_lookup_failures() {
        let mut session = session();
        session.start_game().unwrap();
        assert!(matches!(
            session.select_question("Sports", MOON),
            Err(GameError::NotFound(_))
        ));
        assert!(matches!(
            session.select_question(HISTORY, "Nope"),
            Err(GameError::NotFound(_))
        ));
        assert_eq!(session.phase(), GamePhase::Selection);
    }

    #[test]
    fn completed_question_only_replays_in_tiebreak() {
        let mut session = session();
        session.start_game().unwrap();
        session.override_completion(HISTORY, EMPEROR, true).unwrap();

        assert!(matches!(
            session.select_question(HISTORY, EMPEROR),
            Err(GameError::IllegalTransition(InvalidTransition {
                from: GamePhase::Selection,
                event: GameEvent::SelectQuestion,
                reason: Some("question already complete"),
            }))
        ));
        assert_eq!(session.phase(), GamePhase::Selection);
        session.start_tiebreak().unwrap();
        assert_eq!(session.select_question(HISTORY, EMPEROR), Ok(GamePhase::Waiting));
    }

    #[test]
    fn select_again_closes_active_question() {
        let mut session = armed_session();
        assert_eq!(session.select_question("Cinema", "Name this film"), Ok(GamePhase::Selection));
        assert!(session.board().categories()[0].questions[0].complete);
        assert!(session.active_question().is_none());
        assert_eq!(session.take_directives(), vec![DeviceDirective::Reset]);
    }

    #[test]
    fn media_state_follows_question_flow() {
        let mut session = session();
        bind(&mut session, "Ada", "#ff0000", 0);
        session.start_game().unwrap();
        session.select_question("Cinema", "Name this film").unwrap();
        assert_eq!(session.media(), MediaState::Initial);
        session.activate_buzzers(Instant::now()).unwrap();
        assert_eq!(session.media(), MediaState::PlayQuestion);
        session.handle_device_event(DeviceEvent::Buzz { slot: 0 }, Instant::now());
        session.show_answer().unwrap();
        assert_eq!(session.media(), MediaState::PlayAnswer);
        session.answer_response(true).unwrap();
        assert_eq!(session.media(), MediaState::Initial);
    }

    #[test]
    fn override_completion_is_idempotent() {
        let mut session = session();
        session.override_completion(HISTORY, MOON, true).unwrap();
        let after_once = session.snapshot();
        let logged = session.log().len();

        session.override_completion(HISTORY, MOON, true).unwrap();
        assert_eq!(session.snapshot(), after_once);
        assert_eq!(session.log().len(), logged);

        session.override_completion(HISTORY, MOON, false).unwrap();
        assert!(!session.board().categories()[0].questions[0].complete);
    }

    #[test]
    fn adjust_score_on_empty_slot_is_not_found() {
        let mut session = session();
        assert!(matches!(session.adjust_score(3, 10), Err(GameError::NotFound(_))));
    }

    #[test]
    fn start_game_reissues_indicator_colours() {
        let mut session = session();
        bind(&mut session, "Ada", "#ff0000", 1);
        session.take_directives();
        session.start_game().unwrap();

        let directives = session.take_directives();
        assert_eq!(directives[0], DeviceDirective::Reset);
        assert_eq!(directives.len(), 1 + 8);
        assert_eq!(
            directives[1],
            DeviceDirective::SetColour {
                slot: 0,
                colour: Rgb::WHITE
            }
        );
        assert_eq!(
            directives[2],
            DeviceDirective::SetColour {
                slot: 1,
                colour: "#ff0000".parse().unwrap()
            }
        );
    }

    #[test]
    fn demo_buzzes_are_test_buzzes() {
        let mut session = session();
        bind(&mut session, "Ada", "#ff0000", 3);
        session.start_demo(Instant::now()).unwrap();
        session.take_directives();

        assert_eq!(
            session.handle_device_event(DeviceEvent::Buzz { slot: 3 }, Instant::now()),
            Arbitration::Applied
        );
        assert_eq!(session.phase(), GamePhase::Demo);
        assert_eq!(session.players().find(3).unwrap().score, 0);
        assert_eq!(session.take_directives(), vec![DeviceDirective::Arm]);
        assert_eq!(session.stop_demo(), Ok(GamePhase::Setup));
    }

    #[test]
    fn finish_and_tiebreak() {
        let mut session = session();
        assert!(session.finish_game().is_err());
        session.start_game().unwrap();
        assert_eq!(session.finish_game(), Ok(GamePhase::GameOver));
        assert_eq!(session.start_tiebreak(), Ok(GamePhase::Tiebreak));
    }

    #[test]
    fn snapshot_round_trip_restores_state() {
        let mut source = armed_session();
        source.handle_device_event(DeviceEvent::Buzz { slot: 5 }, Instant::now());
        source.adjust_score(2, 40).unwrap();
        source.override_completion(HISTORY, EMPEROR, true).unwrap();
        let snapshot = source.snapshot();

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: SessionSnapshot = serde_json::from_str(&json).unwrap();

        let mut restored = session();
        assert_eq!(restored.restore(decoded), Ok(GamePhase::Buzzed));
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.buzzed_player().unwrap().name, "Grace");

        let directives = restored.take_directives();
        assert_eq!(directives[0], DeviceDirective::Reset);
        assert!(directives.contains(&DeviceDirective::SetColour {
            slot: 5,
            colour: "#0000ff".parse().unwrap()
        }));
    }

    #[test]
    fn restore_rejects_broken_invariants() {
        let mut session = armed_session();
        let mut snapshot = session.snapshot();
        snapshot.buzzed_slot = Some(2);
        assert!(matches!(
            session.restore(snapshot),
            Err(GameError::InvalidInput(_))
        ));

        let mut snapshot = session.snapshot();
        snapshot.phase = GamePhase::Selection;
        assert!(session.restore(snapshot).is_err());
        assert_eq!(session.phase(), GamePhase::Armed);
    }

    #[test]
    fn restore_resumes_pending_rearm() {
        let mut session = armed_session();
        session.handle_device_event(DeviceEvent::Buzz { slot: 2 }, Instant::now());
        session.answer_response(false).unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.rearm_pending);

        let mut restored = GameSession::new(sample_board(), SessionSettings::default());
        restored.restore(snapshot).unwrap();
        let generation = restored.rearm_pending().unwrap();
        assert!(restored.fire_rearm(generation, Instant::now()));
        assert_eq!(restored.phase(), GamePhase::Armed);
    }

    #[test]
    fn bind_tokens_are_not_reused_after_restore() {
        let mut session = session();
        bind(&mut session, "Ada", "#ff0000", 0);
        assert_eq!(session.register_bind("Grace", "#00ff00"), Ok(BindToken(1)));
        session.handle_device_event(DeviceEvent::Bind { slot: 1 }, Instant::now());
        let snapshot = session.snapshot();

        session.restore(snapshot.clone()).unwrap();
        assert_eq!(session.register_bind("Linus", "#0000ff"), Ok(BindToken(2)));

        let mut fresh = GameSession::new(sample_board(), SessionSettings::default());
        fresh.restore(snapshot).unwrap();
        assert_eq!(fresh.register_bind("Linus", "#0000ff"), Ok(BindToken(2)));
    }

    #[test]
    fn unrecognized_lines_are_logged() {
        let mut session = session();
        session.handle_unrecognized("Z9");
        assert_eq!(
            last_kind(&session),
            &LogKind::HardwareUnrecognized { raw: "Z9".into() }
        );
    }
}
