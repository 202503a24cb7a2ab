//! The diagnostics timer.
//!
//! Text events never publish diagnostics inline; they only mark documents
//! pending. This timer posts `TimerTick` on a fixed cadence and the actor
//! computes and publishes once per marked document, so a burst of edits
//! between ticks costs one publication.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::state::{StateEvent, StateHandle};

/// Delay before the first tick after `initialize`.
pub const FIRST_TICK_DELAY: Duration = Duration::from_millis(1000);

/// Cadence of subsequent ticks.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Spawn the timer task. It runs until the state actor goes away.
pub fn spawn_diagnostics_timer(events: StateHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(FIRST_TICK_DELAY).await;
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            if !events.emit(StateEvent::TimerTick) {
                break;
            }
        }
    })
}
