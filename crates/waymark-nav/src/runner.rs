use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use waymark_proto::{Cue, NavSnapshot};

use crate::nav::{ConfirmationTicket, NavEngine};
use crate::sensor::SensorEvent;

/// Receives audio triggers. Tone and timing are the implementor's business.
pub trait CueSink {
    fn cue(&mut self, cue: Cue);
}

/// Collects cues; handy for hosts that batch them and for tests.
impl CueSink for Vec<Cue> {
    fn cue(&mut self, cue: Cue) {
        self.push(cue);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// The last waypoint was confirmed.
    Completed,
    /// The sensor stream closed first.
    SensorsClosed,
}

// deadlines share one delay, so they are already in firing order
type PendingTimers = VecDeque<(ConfirmationTicket, Instant)>;

enum Wake {
    Sensor(Option<SensorEvent>),
    Confirm(ConfirmationTicket),
}

/// Drives `engine` from `events` until the route is complete or the stream
/// ends.
///
/// Sensor events and confirmation timers are applied one at a time, so a
/// timer always sees the latest sample. Every issued ticket fires once; the
/// engine ignores the ones that went stale in the meantime.
pub async fn drive<C, R>(
    engine: &mut NavEngine,
    events: &mut mpsc::Receiver<SensorEvent>,
    notifier: &mut C,
    mut render: R,
) -> RunEnd
where
    C: CueSink + ?Sized,
    R: FnMut(&NavSnapshot),
{
    let mut timers = PendingTimers::new();
    let delay = engine.params().confirm_delay();

    loop {
        let wake = tokio::select! {
            ev = events.recv() => Wake::Sensor(ev),
            ticket = fire(&mut timers) => Wake::Confirm(ticket),
        };

        let out = match wake {
            Wake::Sensor(Some(ev)) => engine.apply(ev),
            Wake::Sensor(None) => {
                debug!("runner: sensor stream closed");
                return RunEnd::SensorsClosed;
            }
            Wake::Confirm(ticket) => engine.confirm(ticket),
        };

        for cue in &out.cues {
            notifier.cue(*cue);
        }
        if let Some(ticket) = out.schedule {
            timers.push_back((ticket, Instant::now() + delay));
        }
        render(&engine.snapshot());

        if out.completed {
            return RunEnd::Completed;
        }
    }
}

async fn fire(timers: &mut PendingTimers) -> ConfirmationTicket {
    match timers.front().copied() {
        Some((ticket, due)) => {
            tokio::time::sleep_until(due).await;
            timers.pop_front();
            ticket
        }
        None => std::future::pending().await,
    }
}
