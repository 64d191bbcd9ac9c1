pub mod board;
pub mod device;
pub mod event_hub;
pub mod event_log;
mod hardware;
pub mod host_seat;
pub mod players;
pub mod session;
pub mod state_machine;

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::snapshot_store::SnapshotStore,
    services::sse_events,
    state::{board::Board, device::DeviceDirective, session::GameSession},
};

pub use self::hardware::HardwareLink;
use self::{event_hub::EventHub, host_seat::HostSeat};

pub type SharedState = Arc<AppState>;

/// Session plus the deferred re-arm task bound to it.
struct Arbiter {
    session: GameSession,
    rearm: Option<ScheduledRearm>,
}

struct ScheduledRearm {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Central application state: the arbitrated session and the outward links.
pub struct AppState {
    config: Arc<AppConfig>,
    arbiter: Mutex<Arbiter>,
    hardware: HardwareLink,
    public_events: EventHub,
    host_events: EventHub,
    host_seat: HostSeat,
    snapshots: Arc<dyn SnapshotStore>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, board: Board, snapshots: Arc<dyn SnapshotStore>) -> SharedState {
        let session = GameSession::new(board, config.session_settings());
        info!(session_id = %session.id(), slots = config.slots, "session created");
        Arc::new(Self {
            config: Arc::new(config),
            arbiter: Mutex::new(Arbiter {
                session,
                rearm: None,
            }),
            hardware: HardwareLink::new(),
            public_events: EventHub::new("public", 64),
            host_events: EventHub::new("host", 64),
            host_seat: HostSeat::new(),
            snapshots,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Events for every display.
    pub fn public_events(&self) -> &EventHub {
        &self.public_events
    }

    /// Events for the host console only.
    pub fn host_events(&self) -> &EventHub {
        &self.host_events
    }

    pub fn host_seat(&self) -> &HostSeat {
        &self.host_seat
    }

    /// Control boards currently connected.
    pub fn hardware(&self) -> &HardwareLink {
        &self.hardware
    }

    pub fn snapshots(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.snapshots)
    }

    /// Run a mutating operation against the session.
    ///
    /// This is the only write path: host commands, hardware events and the re-arm timer all
    /// go through the same lock, so operations never interleave. Queued directives are sent
    /// and new log entries published before the lock is released.
    pub async fn arbitrate<T>(self: &Arc<Self>, op: impl FnOnce(&mut GameSession) -> T) -> T {
        let mut arbiter = self.arbiter.lock().await;
        let output = op(&mut arbiter.session);
        self.settle(&mut arbiter);
        output
    }

    /// Read-only access to the session.
    pub async fn read<T>(&self, op: impl FnOnce(&GameSession) -> T) -> T {
        let arbiter = self.arbiter.lock().await;
        op(&arbiter.session)
    }

    /// Register a control board and bring it in sync with the session.
    pub async fn attach_board(&self, id: Uuid, tx: mpsc::UnboundedSender<DeviceDirective>) {
        let arbiter = self.arbiter.lock().await;
        self.hardware.attach(id, tx);
        let directives = arbiter.session.connect_directives();
        self.hardware.send_to(id, &directives);
        info!(%id, boards = self.hardware.connected(), "control board attached");
    }

    fn settle(self: &Arc<Self>, arbiter: &mut Arbiter) {
        self.reconcile_rearm(arbiter);

        let directives = arbiter.session.take_directives();
        self.hardware.dispatch(&directives);

        let entries = arbiter.session.take_log_updates();
        if !entries.is_empty() {
            sse_events::broadcast_session_update(self, &arbiter.session, &entries);
        }
    }

    /// Keep the timer task in line with the re-arm the session is waiting for.
    fn reconcile_rearm(self: &Arc<Self>, arbiter: &mut Arbiter) {
        let wanted = arbiter.session.rearm_pending();
        let scheduled = arbiter.rearm.as_ref().map(|rearm| rearm.generation);
        if wanted == scheduled {
            return;
        }

        if let Some(stale) = arbiter.rearm.take() {
            stale.handle.abort();
            debug!(generation = stale.generation, "re-arm task aborted");
        }

        if let Some(generation) = wanted {
            let delay = arbiter.session.settings().rearm_delay;
            let handle = tokio::spawn(Arc::clone(self).run_rearm(generation, delay));
            arbiter.rearm = Some(ScheduledRearm { generation, handle });
        }
    }

    async fn run_rearm(self: Arc<Self>, generation: u64, delay: Duration) {
        sleep(delay).await;
        let mut arbiter = self.arbiter.lock().await;
        if arbiter
            .rearm
            .as_ref()
            .is_some_and(|rearm| rearm.generation == generation)
        {
            arbiter.rearm = None;
        }
        if arbiter.session.fire_rearm(generation, Instant::now()) {
            info!(generation, "buzzers re-armed after cooldown");
        }
        self.settle(&mut arbiter);
    }
}
