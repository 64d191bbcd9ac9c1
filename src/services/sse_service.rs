//! SSE streams for displays and the host console.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::Stream;
use tokio::sync::broadcast;
use tokio_stream::{
    StreamExt,
    wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};
use tracing::{debug, info};

use crate::{
    dto::sse::{HostHandshake, ServerEvent},
    error::ServiceError,
    state::SharedState,
};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Open a display stream. Displays that fall behind resync through `/public/log`.
pub fn public_stream(state: &SharedState) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let receiver = state.public_events().subscribe();
    state.public_events().notice("public stream connected");
    info!("public SSE stream opened");
    into_sse(events("public", receiver))
}

/// Claim the host seat and open the host stream; the first event carries the token.
pub async fn host_stream(
    state: &SharedState,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let token = state.host_seat().claim().await.map_err(|refusal| {
        info!(%refusal, "host stream refused");
        ServiceError::Unauthorized
    })?;
    let receiver = state.host_events().subscribe();
    state.host_events().publish(
        "host_token",
        &HostHandshake {
            token: token.clone(),
        },
    );
    info!("host SSE stream opened");

    let lease = SeatLease {
        state: state.clone(),
        token,
    };
    // The lease lives as long as the stream; dropping the stream frees the seat.
    let stream = events("host", receiver).map(move |event| {
        let _held = &lease;
        event
    });
    Ok(into_sse(stream))
}

/// Check a token presented with a host command. Every refusal looks the same to the caller.
pub async fn verify_host_token(state: &SharedState, provided: Option<&str>) -> Result<(), ServiceError> {
    state.host_seat().verify(provided).await.map_err(|refusal| {
        debug!(%refusal, "host command refused");
        ServiceError::Unauthorized
    })
}

fn events(
    audience: &'static str,
    receiver: broadcast::Receiver<ServerEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(receiver).filter_map(move |received| match received {
        Ok(message) => Some(Ok(Event::from(message))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            debug!(audience, skipped, "SSE subscriber lagged");
            None
        }
    })
}

fn into_sse<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Holds the host seat for the lifetime of a host stream.
struct SeatLease {
    state: SharedState,
    token: String,
}

impl Drop for SeatLease {
    fn drop(&mut self) {
        let state = self.state.clone();
        let token = std::mem::take(&mut self.token);
        tokio::spawn(async move {
            if state.host_seat().release(&token).await {
                info!("host SSE stream closed; seat released");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::snapshot_store::MemorySnapshotStore, state::AppState,
        state::board::tests::sample_board,
    };

    fn state() -> SharedState {
        AppState::new(
            AppConfig::default(),
            sample_board(),
            Arc::new(MemorySnapshotStore::new()),
        )
    }

    #[tokio::test]
    async fn dropping_the_host_stream_frees_the_seat() {
        let state = state();
        let stream = host_stream(&state).await.unwrap();
        assert!(matches!(host_stream(&state).await, Err(ServiceError::Unauthorized)));

        drop(stream);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(host_stream(&state).await.is_ok());
    }
}
