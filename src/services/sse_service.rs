use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::game::GameView,
    state::{SharedState, game_store::GameStore, game_store::shareable_link},
};

/// Name of the SSE event carrying a refreshed game view.
pub const GAME_EVENT: &str = "game";

/// Stream the game as seen by `player`: the current view first, then one
/// event per change of the game document, until the client disconnects.
pub fn game_stream(
    state: &SharedState,
    store: Arc<GameStore>,
    player: Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + use<>> {
    let link = shareable_link(&state.config().public_base_url, store.id());
    let game_id = store.id().to_string();
    let mut views = Box::pin(store.views());

    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads view updates and pushes into mpsc
    tokio::spawn(async move {
        // keep the store open for as long as the client listens
        let _store = store;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                next = views.next() => {
                    let Some(update) = next else { break };
                    let view = GameView::new(update, player.as_deref(), link.clone());
                    let event = match Event::default().event(GAME_EVENT).json_data(&view) {
                        Ok(event) => event,
                        Err(err) => {
                            warn!(game = %game_id, error = %err, "failed to encode game event");
                            continue;
                        }
                    };
                    if tx.send(Ok(event)).await.is_err() {
                        break;
                    }
                }
            }
        }
        info!(game = %game_id, "game SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
