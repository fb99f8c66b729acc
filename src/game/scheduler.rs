//! Fixed-rate tick scheduler
//!
//! Drives every live room forward at the simulation tick rate and fans the
//! resulting state out on each room's broadcast channel.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::warn;

use crate::util::time::TICK_DURATION_MICROS;

use super::room::RoomRegistry;

/// Drives all rooms at a fixed cadence
pub struct TickScheduler {
    registry: Arc<RoomRegistry>,
}

impl TickScheduler {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Run the scheduler loop forever
    pub async fn run(self) {
        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            self.cycle();
        }
    }

    /// One scheduler cycle: tick and broadcast every room (private included),
    /// then reclaim rooms past their empty grace period. A panic while
    /// ticking one room is contained so the remaining rooms still advance.
    pub fn cycle(&self) {
        for room in self.registry.rooms() {
            let outcome = catch_unwind(AssertUnwindSafe(|| room.tick_and_broadcast()));
            if outcome.is_err() {
                warn!(room_id = %room.id, "Tick panicked, skipping room this cycle");
            }
        }

        self.registry.sweep_empty_rooms();
    }
}
