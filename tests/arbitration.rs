//! End-to-end arbitration through the shared state: host commands and control board
//! events race for the same session.

use std::{sync::Arc, time::Duration};

use quiz_buzz_back::{
    config::AppConfig,
    dao::snapshot_store::MemorySnapshotStore,
    dto::host::{AnswerResponseRequest, BindRequest, QuestionRequest},
    error::ServiceError,
    services::{hardware_service, host_service, sse_service},
    state::{
        AppState, SharedState,
        board::Board,
        device::{DeviceDirective, DeviceEvent},
        event_log::LogKind,
        session::Arbitration,
        state_machine::GamePhase,
    },
};
use tokio::{
    sync::mpsc,
    time::{Instant, sleep},
};
use uuid::Uuid;

const BOARD: &str = r#"[
    {
        "title": "History",
        "questions": [
            { "kind": "Text", "prompt": "Year of the moon landing?", "answer": "1969", "reward": 100 },
            { "kind": "Text", "prompt": "First emperor?", "answer": "Augustus", "reward": 200 }
        ]
    }
]"#;

fn new_state() -> SharedState {
    let board: Board = serde_json::from_str(BOARD).unwrap();
    AppState::new(
        AppConfig::default(),
        board,
        Arc::new(MemorySnapshotStore::new()),
    )
}

async fn press(state: &SharedState, line: &str) -> Arbitration {
    let event: DeviceEvent = line.parse().unwrap();
    let arrived = Instant::now();
    state
        .arbitrate(|session| session.handle_device_event(event, arrived))
        .await
}

async fn bind(state: &SharedState, name: &str, colour: &str, slot: u8) {
    host_service::register_bind(
        state,
        BindRequest {
            name: name.into(),
            colour: colour.into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(press(state, &format!("P{slot}")).await, Arbitration::Applied);
}

fn drain(rx: &mut mpsc::UnboundedReceiver<DeviceDirective>) -> Vec<DeviceDirective> {
    let mut seen = Vec::new();
    while let Ok(directive) = rx.try_recv() {
        seen.push(directive);
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn buzz_race_and_cooldown_round() {
    let state = new_state();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.attach_board(Uuid::new_v4(), tx).await;
    assert_eq!(drain(&mut rx).first(), Some(&DeviceDirective::Reset));

    bind(&state, "Ada", "#ff0000", 0).await;
    bind(&state, "Grace", "#00ff00", 1).await;

    host_service::start_game(&state).await.unwrap();
    host_service::select_question(
        &state,
        QuestionRequest {
            category: "History".into(),
            question: "First emperor?".into(),
        },
    )
    .await
    .unwrap();
    host_service::activate_buzzers(&state).await.unwrap();
    drain(&mut rx);

    // Both buzzers and a garbled line arrive in one frame; only the first buzz counts.
    hardware_service::handle_frame(&state, "B1\nB0\n\nZ9\n").await;
    let (buzzed, tail) = state
        .read(|session| {
            let entries = session.log().entries();
            let tail: Vec<LogKind> = entries[entries.len() - 2..]
                .iter()
                .map(|entry| entry.kind.clone())
                .collect();
            (session.buzzed_player().map(|player| player.slot), tail)
        })
        .await;
    assert_eq!(buzzed, Some(1));
    assert!(matches!(
        tail[0],
        LogKind::BuzzLate {
            slot: 0,
            phase: GamePhase::Buzzed,
            ..
        }
    ));
    assert_eq!(tail[1], LogKind::HardwareUnrecognized { raw: "Z9".into() });

    let response = host_service::answer_response(&state, AnswerResponseRequest { correct: false })
        .await
        .unwrap();
    assert_eq!(response.phase, GamePhase::Buzzed);
    assert_eq!(drain(&mut rx), vec![DeviceDirective::Signal { correct: false }]);

    sleep(Duration::from_millis(4_100)).await;
    assert_eq!(state.read(|session| session.phase()).await, GamePhase::Armed);
    assert_eq!(drain(&mut rx), vec![DeviceDirective::Arm]);

    assert_eq!(press(&state, "B0").await, Arbitration::Applied);
    let response = host_service::answer_response(&state, AnswerResponseRequest { correct: true })
        .await
        .unwrap();
    assert_eq!(response.phase, GamePhase::Selection);

    let scores = state
        .read(|session| {
            session
                .players()
                .players()
                .map(|player| (player.slot, player.score))
                .collect::<Vec<_>>()
        })
        .await;
    assert_eq!(scores, vec![(0, 200), (1, -200)]);
}

#[tokio::test(start_paused = true)]
async fn snapshot_store_round_trip_restores_session() {
    let state = new_state();
    bind(&state, "Ada", "#ff0000", 3).await;
    host_service::start_game(&state).await.unwrap();

    let saved = host_service::save_snapshot(&state).await.unwrap();
    host_service::start_tiebreak(&state).await.unwrap();
    assert_eq!(state.read(|session| session.phase()).await, GamePhase::Tiebreak);

    let (tx, mut rx) = mpsc::unbounded_channel();
    state.attach_board(Uuid::new_v4(), tx).await;
    drain(&mut rx);

    let restored = host_service::load_snapshot(&state, saved.id).await.unwrap();
    assert_eq!(restored.phase, GamePhase::Selection);
    assert!(drain(&mut rx).contains(&DeviceDirective::SetColour {
        slot: 3,
        colour: "#ff0000".parse().unwrap(),
    }));

    let listed = host_service::list_snapshots(&state).await.unwrap();
    assert_eq!(listed.len(), 1);
    host_service::delete_snapshot(&state, saved.id).await.unwrap();
    assert!(matches!(
        host_service::load_snapshot(&state, saved.id).await,
        Err(ServiceError::NotFound(_))
    ));
}

#[tokio::test]
async fn host_token_is_exclusive_and_required() {
    let state = new_state();
    assert!(matches!(
        sse_service::verify_host_token(&state, Some("anything")).await,
        Err(ServiceError::Unauthorized)
    ));

    let token = state.host_seat().claim().await.unwrap();
    assert!(sse_service::verify_host_token(&state, Some(&token)).await.is_ok());
    assert!(sse_service::verify_host_token(&state, None).await.is_err());
    assert!(sse_service::verify_host_token(&state, Some("forged")).await.is_err());
    assert!(matches!(
        sse_service::host_stream(&state).await,
        Err(ServiceError::Unauthorized)
    ));
}
