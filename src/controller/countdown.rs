// src/controller/countdown.rs

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Identifies one armed countdown: a question index within one started test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickStamp {
    pub generation: u64,
    pub question_index: usize,
}

/// Per-question countdown. Owned by the active test state, so it is dropped
/// on every transition out of that state.
#[derive(Debug)]
pub struct Countdown {
    duration: u32,
    remaining: u32,
    stamp: TickStamp,
}

impl Countdown {
    pub fn arm(duration: u32, stamp: TickStamp) -> Self {
        let duration = duration.max(1);
        Self {
            duration,
            remaining: duration,
            stamp,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn stamp(&self) -> TickStamp {
        self.stamp
    }

    /// Counts one unit down. Returns `true` when this tick hit zero.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

/// Tick source bound to a single stamp. Dropping it stops the ticks.
pub struct Metronome {
    stamp: TickStamp,
    interval: Interval,
}

impl Metronome {
    pub fn start(stamp: TickStamp, period: Duration) -> Self {
        // First tick one full period from now, not immediately.
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { stamp, interval }
    }

    pub fn stamp(&self) -> TickStamp {
        self.stamp
    }

    pub async fn next(&mut self) -> TickStamp {
        self.interval.tick().await;
        self.stamp
    }
}

/// Keeps `slot` bound to the countdown that is currently armed: a metronome
/// for an older stamp is dropped and replaced, and none runs when no
/// countdown is armed.
pub fn sync_metronome(slot: &mut Option<Metronome>, current: Option<TickStamp>, period: Duration) {
    match current {
        Some(stamp) if slot.as_ref().map(Metronome::stamp) == Some(stamp) => {}
        Some(stamp) => *slot = Some(Metronome::start(stamp, period)),
        None => *slot = None,
    }
}

/// Next tick of the slot's metronome; never resolves while the slot is empty.
pub async fn next_tick(slot: &mut Option<Metronome>) -> TickStamp {
    match slot {
        Some(metronome) => metronome.next().await,
        None => std::future::pending().await,
    }
}
