use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Longest accepted player name.
pub const MAX_NAME_LENGTH: usize = 32;

/// Indicator colour of a buzzer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Plain white, used for slots without a player.
    pub const WHITE: Rgb = Rgb {
        r: 0xff,
        g: 0xff,
        b: 0xff,
    };

    /// Pack the colour as the 24-bit integer understood by the control board.
    pub fn to_u24(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

/// Raised when a colour string is not `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("colour `{0}` is not a `#rrggbb` hex value")]
pub struct InvalidColour(pub String);

impl FromStr for Rgb {
    type Err = InvalidColour;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidColour(value.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| InvalidColour(value.to_string()))
        };
        Ok(Rgb {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl TryFrom<String> for Rgb {
    type Error = InvalidColour;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// A contestant bound to a buzzer slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Player {
    /// Display name.
    pub name: String,
    /// Buzzer slot the player answers from.
    pub slot: u8,
    /// Indicator colour of the slot.
    #[schema(value_type = String, example = "#ff0000")]
    pub colour: Rgb,
    /// Cumulative score, may go negative.
    pub score: i32,
}

/// Identifier handed back when a bind intent is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct BindToken(pub u64);

/// Bind intent waiting for the next hardware bind event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingBind {
    /// Token returned to the host when the intent was recorded.
    pub token: BindToken,
    /// Name to give the player.
    pub name: String,
    /// Colour to give the slot.
    #[schema(value_type = String, example = "#00ff00")]
    pub colour: Rgb,
}

/// Result of committing a pending bind to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    /// The player now occupying the slot.
    pub player: Player,
    /// Previous occupant, when the slot was already taken.
    pub replaced: Option<Player>,
}

/// Failures of registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("player name must not be empty")]
    EmptyName,
    #[error("player name must not exceed {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error(transparent)]
    Colour(#[from] InvalidColour),
    #[error("no player bound to slot {0}")]
    UnknownSlot(u8),
    #[error("slot {0} is listed more than once")]
    DuplicateSlot(u8),
}

/// Mapping of buzzer slots to players, plus the bind intent in flight.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: BTreeMap<u8, Player>,
    pending: Option<PendingBind>,
    next_token: u64,
}

impl PlayerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from persisted players, rejecting duplicate slots.
    ///
    /// Tokens continue after `issued_tokens` and after the pending intent, so no token is
    /// handed out twice.
    pub fn restore(
        players: Vec<Player>,
        pending: Option<PendingBind>,
        issued_tokens: u64,
    ) -> Result<Self, RegistryError> {
        let mut by_slot = BTreeMap::new();
        for player in players {
            let slot = player.slot;
            if by_slot.insert(slot, player).is_some() {
                return Err(RegistryError::DuplicateSlot(slot));
            }
        }
        let next_token = pending
            .as_ref()
            .map_or(issued_tokens, |p| issued_tokens.max(p.token.0 + 1));
        Ok(Self {
            players: by_slot,
            pending,
            next_token,
        })
    }

    /// Record a bind intent. The slot is only assigned by [`Self::resolve_bind`].
    ///
    /// A newer intent replaces an unresolved older one; the superseded intent is returned.
    pub fn bind(
        &mut self,
        name: &str,
        colour: &str,
    ) -> Result<(BindToken, Option<PendingBind>), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(RegistryError::NameTooLong);
        }
        let colour: Rgb = colour.parse()?;

        let token = BindToken(self.next_token);
        self.next_token += 1;
        let superseded = self.pending.replace(PendingBind {
            token,
            name: name.to_string(),
            colour,
        });
        Ok((token, superseded))
    }

    /// Commit the pending intent at `slot`. Returns `None` when nothing is pending.
    ///
    /// An existing occupant is overwritten; the slot keeps its score.
    pub fn resolve_bind(&mut self, slot: u8) -> Option<BindOutcome> {
        let PendingBind { name, colour, .. } = self.pending.take()?;
        let replaced = self.players.get(&slot).cloned();
        let player = Player {
            name,
            slot,
            colour,
            score: replaced.as_ref().map_or(0, |previous| previous.score),
        };
        self.players.insert(slot, player.clone());
        Some(BindOutcome { player, replaced })
    }

    /// Add `delta` to the score of the player at `slot`, returning the new score.
    pub fn adjust_score(&mut self, slot: u8, delta: i32) -> Result<i32, RegistryError> {
        let player = self
            .players
            .get_mut(&slot)
            .ok_or(RegistryError::UnknownSlot(slot))?;
        player.score = player.score.saturating_add(delta);
        Ok(player.score)
    }

    /// Player bound to `slot`.
    pub fn find(&self, slot: u8) -> Option<&Player> {
        self.players.get(&slot)
    }

    /// Players ordered by slot.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of bind tokens handed out so far.
    pub fn issued_tokens(&self) -> u64 {
        self.next_token
    }

    /// Bind intent awaiting a hardware bind event.
    pub fn pending(&self) -> Option<&PendingBind> {
        self.pending.as_ref()
    }

    /// Number of bound players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Whether no player has been bound yet.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colour_parsing() {
        assert_eq!(
            "#ff8000".parse::<Rgb>().unwrap(),
            Rgb {
                r: 0xff,
                g: 0x80,
                b: 0x00
            }
        );
        assert_eq!("00FF00".parse::<Rgb>().unwrap().to_u24(), 0x00ff00);
        assert!("".parse::<Rgb>().is_err());
        assert!("#fff".parse::<Rgb>().is_err());
        assert!("#gg0000".parse::<Rgb>().is_err());
        assert_eq!(Rgb::WHITE.to_string(), "#ffffff");
        assert_eq!(Rgb::WHITE.to_u24(), 16_777_215);
    }

    #[test]
    fn bind_validates_input() {
        let mut registry = PlayerRegistry::new();
        assert_eq!(registry.bind("  ", "#ff0000"), Err(RegistryError::EmptyName));
        assert!(matches!(
            registry.bind("Ada", "red"),
            Err(RegistryError::Colour(_))
        ));
        assert_eq!(
            registry.bind(&"x".repeat(MAX_NAME_LENGTH + 1), "#ff0000"),
            Err(RegistryError::NameTooLong)
        );
        assert!(registry.pending().is_none());
    }

    #[test]
    fn resolve_without_pending_is_noop() {
        let mut registry = PlayerRegistry::new();
        assert!(registry.resolve_bind(3).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn bind_then_resolve_assigns_slot() {
        let mut registry = PlayerRegistry::new();
        let (token, superseded) = registry.bind(" Ada ", "#ff0000").unwrap();
        assert_eq!(token, BindToken(0));
        assert!(superseded.is_none());

        let outcome = registry.resolve_bind(2).unwrap();
        assert_eq!(outcome.player.name, "Ada");
        assert_eq!(outcome.player.slot, 2);
        assert!(outcome.replaced.is_none());
        assert!(registry.pending().is_none());
        assert_eq!(registry.find(2).unwrap().colour.to_u24(), 0xff0000);
    }

    #[test]
    fn newer_intent_supersedes_older() {
        let mut registry = PlayerRegistry::new();
        registry.bind("Ada", "#ff0000").unwrap();
        let (token, superseded) = registry.bind("Grace", "#0000ff").unwrap();
        assert_eq!(token, BindToken(1));
        assert_eq!(superseded.unwrap().name, "Ada");
        assert_eq!(registry.resolve_bind(0).unwrap().player.name, "Grace");
    }

    #[test]
    fn rebind_overwrites_occupant_and_keeps_score() {
        let mut registry = PlayerRegistry::new();
        registry.bind("Ada", "#ff0000").unwrap();
        registry.resolve_bind(1);
        registry.adjust_score(1, 300).unwrap();

        registry.bind("Grace", "#00ff00").unwrap();
        let outcome = registry.resolve_bind(1).unwrap();
        assert_eq!(outcome.replaced.unwrap().name, "Ada");
        assert_eq!(outcome.player.score, 300);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find(1).unwrap().colour.to_string(), "#00ff00");
    }

    #[test]
    fn adjust_score_requires_bound_slot() {
        let mut registry = PlayerRegistry::new();
        assert_eq!(
            registry.adjust_score(4, 10),
            Err(RegistryError::UnknownSlot(4))
        );
        registry.bind("Ada", "#ff0000").unwrap();
        registry.resolve_bind(4);
        assert_eq!(registry.adjust_score(4, -250), Ok(-250));
    }

    #[test]
    fn restore_rejects_duplicate_slots() {
        let player = Player {
            name: "Ada".into(),
            slot: 1,
            colour: Rgb::WHITE,
            score: 0,
        };
        let err = PlayerRegistry::restore(vec![player.clone(), player], None, 0).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSlot(1));
    }

    #[test]
    fn restore_keeps_tokens_unique() {
        let mut registry = PlayerRegistry::new();
        registry.bind("Ada", "#ff0000").unwrap();
        registry.resolve_bind(0);
        registry.bind("Grace", "#00ff00").unwrap();
        registry.resolve_bind(1);

        let players = registry.players().cloned().collect();
        let mut restored =
            PlayerRegistry::restore(players, None, registry.issued_tokens()).unwrap();
        let (token, _) = restored.bind("Linus", "#0000ff").unwrap();
        assert_eq!(token, BindToken(2));
    }
}
