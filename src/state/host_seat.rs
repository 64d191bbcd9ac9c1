//! The single host console allowed to drive the session.

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Why a presented token was refused. Only ever logged, never sent to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SeatRefusal {
    #[error("another host holds the seat")]
    Occupied,
    #[error("no host stream is open")]
    Vacant,
    #[error("token header missing")]
    Missing,
    #[error("token mismatch")]
    Mismatch,
}

/// Seat claimed by opening the host stream; its token authorises host commands.
#[derive(Debug, Default)]
pub struct HostSeat {
    token: Mutex<Option<String>>,
}

impl HostSeat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the seat and mint its token.
    pub async fn claim(&self) -> Result<String, SeatRefusal> {
        let mut held = self.token.lock().await;
        if held.is_some() {
            return Err(SeatRefusal::Occupied);
        }
        let token = Uuid::new_v4().simple().to_string();
        *held = Some(token.clone());
        Ok(token)
    }

    pub async fn verify(&self, provided: Option<&str>) -> Result<(), SeatRefusal> {
        let held = self.token.lock().await;
        match (held.as_deref(), provided) {
            (None, _) => Err(SeatRefusal::Vacant),
            (Some(_), None) => Err(SeatRefusal::Missing),
            (Some(expected), Some(provided)) if expected == provided => Ok(()),
            (Some(_), Some(_)) => Err(SeatRefusal::Mismatch),
        }
    }

    /// Free the seat if `token` still holds it. Returns whether it was released.
    pub async fn release(&self, token: &str) -> bool {
        let mut held = self.token.lock().await;
        if held.as_deref() == Some(token) {
            *held = None;
            true
        } else {
            false
        }
    }
}
