use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::{
    SharedState,
    device::{DeviceDirective, DeviceEvent},
};

/// Handle the full lifecycle of a control board WebSocket connection.
///
/// Inbound text frames carry newline-separated device events; outbound directives are sent one
/// per frame.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<DeviceDirective>();

    // Dedicated writer task keeps directives flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(directive) = outbound_rx.recv().await {
            if sender
                .send(Message::Text(directive.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    state.attach_board(id, outbound_tx.clone()).await;

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(&state, text.as_str()).await,
            Ok(Message::Close(_)) => {
                info!(%id, "control board closed the connection");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Binary(_)) => {
                debug!(%id, "ignoring binary frame from control board");
            }
            Err(err) => {
                warn!(%id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.hardware().detach(id);
    info!(%id, "control board disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Feed every non-blank line of an inbound text frame to the arbiter, in order.
///
/// All lines of a frame share the arrival time taken before the first lock.
pub async fn handle_frame(state: &SharedState, frame: &str) {
    let arrived = Instant::now();
    for line in frame.lines().filter(|line| !line.trim().is_empty()) {
        handle_line(state, line, arrived).await;
    }
}

/// Decode one device line and feed it to the arbiter. Undecodable lines are logged and dropped.
async fn handle_line(state: &SharedState, line: &str, arrived: Instant) {
    match line.parse::<DeviceEvent>() {
        Ok(event) => {
            debug!(code = %event.code(), slot = event.slot(), "device event received");
            state
                .arbitrate(|session| session.handle_device_event(event, arrived))
                .await;
        }
        Err(err) => {
            debug!(error = %err, "device line rejected");
            state
                .arbitrate(|session| session.handle_unrecognized(line.trim()))
                .await;
        }
    }
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<DeviceDirective>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
