//! Periodic closing of open games nobody uses anymore.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::info;

use crate::state::SharedState;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Close idle games forever, checking twice per idle timeout.
pub async fn run(state: SharedState) {
    let period = (state.config().idle_game_timeout / 2).max(MIN_SWEEP_INTERVAL);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let closed = state.evict_idle_games(Instant::now()).await;
        if closed > 0 {
            info!(closed, "closed idle games");
        }
    }
}
