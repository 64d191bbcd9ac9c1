use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::device::DeviceDirective;

/// Connected control boards, each fed through its socket writer task.
#[derive(Default)]
pub struct HardwareLink {
    boards: DashMap<Uuid, mpsc::UnboundedSender<DeviceDirective>>,
}

impl HardwareLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the outbound queue of a new connection.
    pub fn attach(&self, id: Uuid, tx: mpsc::UnboundedSender<DeviceDirective>) {
        self.boards.insert(id, tx);
    }

    /// Forget a connection. Returns whether it was registered.
    pub fn detach(&self, id: Uuid) -> bool {
        self.boards.remove(&id).is_some()
    }

    /// Queue directives on every connected board, pruning closed connections.
    ///
    /// Never waits on socket I/O.
    pub fn dispatch(&self, directives: &[DeviceDirective]) {
        if directives.is_empty() {
            return;
        }
        if self.boards.is_empty() {
            debug!(count = directives.len(), "no control board connected; directives dropped");
            return;
        }

        let mut dead = Vec::new();
        for entry in self.boards.iter() {
            if directives.iter().any(|directive| entry.value().send(*directive).is_err()) {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            warn!(%id, "control board channel closed; detaching");
            self.boards.remove(&id);
        }
    }

    /// Queue directives on a single board.
    pub fn send_to(&self, id: Uuid, directives: &[DeviceDirective]) -> bool {
        let Some(tx) = self.boards.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };
        directives.iter().all(|directive| tx.send(*directive).is_ok())
    }

    /// Number of boards currently connected.
    pub fn connected(&self) -> usize {
        self.boards.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reaches_every_board_and_prunes_closed_ones() {
        let link = HardwareLink::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let alive = Uuid::new_v4();
        link.attach(alive, tx_a);
        link.attach(Uuid::new_v4(), tx_b);
        drop(rx_b);

        link.dispatch(&[DeviceDirective::Reset, DeviceDirective::Arm]);

        assert_eq!(rx_a.try_recv().unwrap(), DeviceDirective::Reset);
        assert_eq!(rx_a.try_recv().unwrap(), DeviceDirective::Arm);
        assert_eq!(link.connected(), 1);
        assert!(link.detach(alive));
        assert!(!link.send_to(alive, &[DeviceDirective::Reset]));
    }
}
