//! Self-healing watchdog.
//!
//! Two producers, the body mutation observer and a fixed interval timer, feed
//! the same idempotent heal operation on the engine. The watchdog itself only
//! owns the observer registration and its lifecycle:
//!
//! ```text
//! Idle --start--> Watching --stop--> Stopped
//! ```
//!
//! There is no way back out of `Stopped`; a page load gets one watchdog.

use crate::dom::{HostDocument, ObserverId};
use serde::Serialize;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchdogState {
    #[default]
    Idle,
    Watching { observer: ObserverId },
    Stopped,
}

/// What woke the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealTrigger {
    Mutation,
    Timer,
}

#[derive(Debug, Default)]
pub struct Watchdog {
    state: WatchdogState,
    heals: u64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WatchdogState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchdogState::Watching { .. })
    }

    /// Begin observing the body. Returns false if already started or stopped.
    pub fn start<D: HostDocument + ?Sized>(&mut self, doc: &mut D) -> bool {
        if self.state != WatchdogState::Idle {
            trace!("Watchdog start ignored in state {:?}", self.state);
            return false;
        }
        let body = doc.body();
        let observer = doc.observe_mutations(body);
        self.state = WatchdogState::Watching { observer };
        debug!("Watchdog watching");
        true
    }

    pub fn stop<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if let WatchdogState::Watching { observer } = self.state {
            doc.disconnect_observer(observer);
            debug!("Watchdog stopped after {} heals", self.heals);
        }
        self.state = WatchdogState::Stopped;
    }

    /// Count a heal that actually had to restore something
    pub fn record_heal(&mut self, trigger: HealTrigger) {
        self.heals += 1;
        debug!("Watchdog heal #{} via {:?}", self.heals, trigger);
    }

    pub fn heals(&self) -> u64 {
        self.heals
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            WatchdogState::Idle => "idle",
            WatchdogState::Watching { .. } => "watching",
            WatchdogState::Stopped => "stopped",
        }
    }
}
