//! Line protocol spoken with the buzzer control board.
//!
//! Inbound events are one command letter followed by a slot number (`P3`, `B2`, `L5`).
//! Anything after a `|` separator is ignored. Outbound directives are `R`, `A`, `Y`, `N`
//! and `C<slot>|<rgb24>`.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::state::players::Rgb;

/// Discrete event reported by the control board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A buzzer was pressed to claim the pending bind intent.
    Bind { slot: u8 },
    /// A buzzer was pressed while the board considered itself armed.
    Buzz { slot: u8 },
    /// A buzzer was pressed after another slot already won the race.
    LateBuzz { slot: u8 },
}

impl DeviceEvent {
    /// Slot the event refers to.
    pub fn slot(self) -> u8 {
        match self {
            DeviceEvent::Bind { slot } | DeviceEvent::Buzz { slot } | DeviceEvent::LateBuzz { slot } => {
                slot
            }
        }
    }

    /// Command letter of the event.
    pub fn code(self) -> char {
        match self {
            DeviceEvent::Bind { .. } => 'P',
            DeviceEvent::Buzz { .. } => 'B',
            DeviceEvent::LateBuzz { .. } => 'L',
        }
    }
}

/// Raised when a line cannot be decoded into a [`DeviceEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HardwareError {
    #[error("empty device line")]
    Empty,
    #[error("unknown device command `{code}` in `{raw}`")]
    UnknownCode { code: char, raw: String },
    #[error("invalid slot in device line `{raw}`")]
    InvalidSlot { raw: String },
}

impl FromStr for DeviceEvent {
    type Err = HardwareError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let mut chars = line.chars();
        let code = chars.next().ok_or(HardwareError::Empty)?;
        let payload = chars.as_str();
        let slot_text = payload.split('|').next().unwrap_or_default().trim();

        let build: fn(u8) -> DeviceEvent = match code {
            'P' => |slot| DeviceEvent::Bind { slot },
            'B' => |slot| DeviceEvent::Buzz { slot },
            'L' => |slot| DeviceEvent::LateBuzz { slot },
            code => {
                return Err(HardwareError::UnknownCode {
                    code,
                    raw: line.to_string(),
                });
            }
        };

        slot_text
            .parse::<u8>()
            .map(build)
            .map_err(|_| HardwareError::InvalidSlot {
                raw: line.to_string(),
            })
    }
}

/// Outbound instruction for the control board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDirective {
    /// Clear every buzzer and indicator state.
    Reset,
    /// Accept the next buzz.
    Arm,
    /// Flash the correct/incorrect feedback.
    Signal { correct: bool },
    /// Set the indicator colour of a slot.
    SetColour { slot: u8, colour: Rgb },
}

impl fmt::Display for DeviceDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceDirective::Reset => f.write_str("R"),
            DeviceDirective::Arm => f.write_str("A"),
            DeviceDirective::Signal { correct: true } => f.write_str("Y"),
            DeviceDirective::Signal { correct: false } => f.write_str("N"),
            DeviceDirective::SetColour { slot, colour } => {
                write!(f, "C{slot}|{}", colour.to_u24())
            }
        }
    }
}
