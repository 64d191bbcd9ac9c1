use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Phases of the show, in flow order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// Players are being bound to buzzers; nothing is played yet.
    Setup,
    /// Buzzers are armed for testing; presses are logged but never scored.
    Demo,
    /// The host picks the next question on the board.
    Selection,
    /// A question is on screen, buzzers are not armed yet.
    Waiting,
    /// Buzzers are armed; the first press wins.
    Armed,
    /// A player buzzed and is answering.
    Buzzed,
    /// The answer is shown.
    Answered,
    /// Extra round to break a tie.
    Tiebreak,
    /// Every question has been played and the host closed the game.
    GameOver,
}

impl GamePhase {
    /// Phases in which a question is active.
    pub fn has_active_question(self) -> bool {
        matches!(
            self,
            GamePhase::Waiting | GamePhase::Armed | GamePhase::Buzzed | GamePhase::Answered
        )
    }

    /// Phases in which a buzzed player may be set.
    pub fn allows_buzzed_player(self) -> bool {
        matches!(self, GamePhase::Buzzed | GamePhase::Answered)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Arm the buzzers for a test round before the game.
    StartDemo,
    /// Leave the demo and return to setup.
    StopDemo,
    /// Start (or restart) the game on the selection board.
    StartGame,
    /// Open a question from the board.
    SelectQuestion,
    /// Close the active question without scoring.
    Unselect,
    /// Arm the buzzers for the active question.
    ActivateBuzzers,
    /// A bound slot pressed its buzzer.
    Buzz { slot: u8 },
    /// Reveal the answer.
    ShowAnswer,
    /// The buzzed player answered correctly.
    AnswerCorrect,
    /// The buzzed player answered incorrectly.
    AnswerIncorrect,
    /// The cooldown after a wrong answer elapsed.
    Rearm,
    /// Close the game.
    FinishGame,
    /// Enter a tiebreak round.
    StartTiebreak,
}

/// Error returned when attempting to apply an invalid transition.
///
/// `reason` is set when the phase allows the event but the session data does not,
/// e.g. a completed question outside a tiebreak.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "invalid transition: {event:?} cannot be applied while in {from:?}{}",
    .reason.map(|reason| format!(" ({reason})")).unwrap_or_default()
)]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
    pub reason: Option<&'static str>,
}

impl InvalidTransition {
    /// The phase has no edge for `event`.
    pub fn new(from: GamePhase, event: GameEvent) -> Self {
        Self {
            from,
            event,
            reason: None,
        }
    }

    /// The edge exists but a data precondition failed.
    pub fn because(from: GamePhase, event: GameEvent, reason: &'static str) -> Self {
        Self {
            from,
            event,
            reason: Some(reason),
        }
    }
}

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    /// Phase the state machine is currently in.
    pub from: GamePhase,
    /// Phase the state machine will transition to.
    pub to: GamePhase,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// Generation after applying this transition.
    pub generation_next: u64,
}

/// Phase holder enforcing the legal edges of the show.
///
/// Validation and application are split so callers can check data preconditions
/// between the two without touching the phase on failure.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    generation: u64,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Setup,
            generation: 0,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine in the setup phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume at `phase`, e.g. after restoring a snapshot.
    pub fn resume(phase: GamePhase, generation: u64) -> Self {
        Self { phase, generation }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Current generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Validate that `event` can be applied from the current phase.
    pub fn plan(&self, event: GameEvent) -> Result<Plan, InvalidTransition> {
        let to = self.compute_transition(event)?;
        Ok(Plan {
            from: self.phase,
            to,
            event,
            generation_next: self.generation + 1,
        })
    }

    /// Apply a plan produced by [`Self::plan`] and return the new phase.
    pub fn apply(&mut self, plan: Plan) -> GamePhase {
        debug_assert_eq!(self.phase, plan.from, "plan applied from a stale phase");
        debug_assert_eq!(self.generation + 1, plan.generation_next);
        self.phase = plan.to;
        self.generation = plan.generation_next;
        self.phase
    }

    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        use GamePhase::*;

        let next = match (self.phase, event) {
            (Setup, GameEvent::StartDemo) => Demo,
            (Demo, GameEvent::StopDemo) => Setup,
            (_, GameEvent::StartGame) => Selection,
            (Selection | Tiebreak, GameEvent::SelectQuestion) => Waiting,
            (Waiting | Armed | Buzzed | Answered, GameEvent::Unselect) => Selection,
            (Waiting | Answered, GameEvent::ActivateBuzzers) => Armed,
            (Armed, GameEvent::Buzz { .. }) => Buzzed,
            (Buzzed, GameEvent::ShowAnswer) => Answered,
            (Buzzed | Answered, GameEvent::AnswerCorrect) => Selection,
            (phase @ (Buzzed | Answered), GameEvent::AnswerIncorrect) => phase,
            (Buzzed | Answered, GameEvent::Rearm) => Armed,
            (Selection, GameEvent::FinishGame) => GameOver,
            (Selection | GameOver, GameEvent::StartTiebreak) => Tiebreak,
            (from, event) => return Err(InvalidTransition::new(from, event)),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GamePhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan)
    }

    #[test]
    fn initial_state_is_setup() {
        let sm = GameStateMachine::new();
        assert_eq!(sm.phase(), GamePhase::Setup);
        assert_eq!(sm.generation(), 0);
    }

    #[test]
    fn full_happy_path_through_question() {
        let mut sm = GameStateMachine::new();

        assert_eq!(apply(&mut sm, GameEvent::StartDemo), GamePhase::Demo);
        assert_eq!(apply(&mut sm, GameEvent::StartGame), GamePhase::Selection);
        assert_eq!(apply(&mut sm, GameEvent::SelectQuestion), GamePhase::Waiting);
        assert_eq!(apply(&mut sm, GameEvent::ActivateBuzzers), GamePhase::Armed);
        assert_eq!(apply(&mut sm, GameEvent::Buzz { slot: 2 }), GamePhase::Buzzed);
        assert_eq!(apply(&mut sm, GameEvent::ShowAnswer), GamePhase::Answered);
        assert_eq!(apply(&mut sm, GameEvent::AnswerCorrect), GamePhase::Selection);
        assert_eq!(apply(&mut sm, GameEvent::FinishGame), GamePhase::GameOver);
        assert_eq!(apply(&mut sm, GameEvent::StartTiebreak), GamePhase::Tiebreak);
        assert_eq!(apply(&mut sm, GameEvent::SelectQuestion), GamePhase::Waiting);
        assert_eq!(sm.generation(), 10);
    }

    #[test]
    fn wrong_answer_keeps_phase_until_rearm() {
        let mut sm = GameStateMachine::resume(GamePhase::Buzzed, 7);
        assert_eq!(apply(&mut sm, GameEvent::AnswerIncorrect), GamePhase::Buzzed);
        assert_eq!(sm.generation(), 8);
        assert_eq!(apply(&mut sm, GameEvent::Rearm), GamePhase::Armed);

        let mut sm = GameStateMachine::resume(GamePhase::Answered, 0);
        assert_eq!(apply(&mut sm, GameEvent::AnswerIncorrect), GamePhase::Answered);
        assert_eq!(apply(&mut sm, GameEvent::ActivateBuzzers), GamePhase::Armed);
    }

    #[test]
    fn start_game_is_legal_from_every_phase() {
        for phase in [
            GamePhase::Setup,
            GamePhase::Demo,
            GamePhase::Selection,
            GamePhase::Waiting,
            GamePhase::Armed,
            GamePhase::Buzzed,
            GamePhase::Answered,
            GamePhase::Tiebreak,
            GamePhase::GameOver,
        ] {
            let sm = GameStateMachine::resume(phase, 0);
            assert_eq!(sm.plan(GameEvent::StartGame).unwrap().to, GamePhase::Selection);
        }
    }

    #[test]
    fn buzz_is_only_legal_while_armed() {
        for phase in [GamePhase::Waiting, GamePhase::Buzzed, GamePhase::Answered] {
            let sm = GameStateMachine::resume(phase, 0);
            assert_eq!(
                sm.plan(GameEvent::Buzz { slot: 1 }).unwrap_err(),
                InvalidTransition::new(phase, GameEvent::Buzz { slot: 1 })
            );
        }
    }

    #[test]
    fn invalid_transition_leaves_phase_untouched() {
        let sm = GameStateMachine::resume(GamePhase::Selection, 3);
        let err = sm.plan(GameEvent::ShowAnswer).unwrap_err();
        assert_eq!(err.from, GamePhase::Selection);
        assert_eq!(err.event, GameEvent::ShowAnswer);
        assert_eq!(err.reason, None);
        assert_eq!(sm.phase(), GamePhase::Selection);
        assert_eq!(sm.generation(), 3);
    }

    #[test]
    fn answer_requires_buzzed_or_answered() {
        let sm = GameStateMachine::resume(GamePhase::Armed, 0);
        assert!(sm.plan(GameEvent::AnswerCorrect).is_err());
        assert!(sm.plan(GameEvent::AnswerIncorrect).is_err());
        assert!(sm.plan(GameEvent::Rearm).is_err());
    }
}
