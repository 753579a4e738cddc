//! Dual-transport order tracker.
//!
//! One task owns both transports: the push subscription and the poll
//! interval live and die together, so neither outlives the other.
//! Transport failures are logged and swallowed; the poll path is the
//! correctness backstop, not an optimization.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TrackingConfig;
use crate::domain::OrderSnapshot;
use crate::interfaces::{OrderSource, OrderStream};

use super::status::{merge, Merge};

/// Locally held view of one tracked order.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingState {
    /// No snapshot observed yet.
    Connecting,
    /// Latest accepted snapshot.
    Tracking(OrderSnapshot),
    /// The poll path repeatedly failed to find the order at all.
    NotFound,
}

/// Handle to a running tracker task.
///
/// Dropping the handle (or calling [`OrderTracker::stop`]) aborts the
/// task, tearing down subscription and poll timer together.
pub struct OrderTracker {
    rx: watch::Receiver<TrackingState>,
    handle: JoinHandle<()>,
}

impl OrderTracker {
    /// Start tracking one order.
    pub fn spawn(source: Arc<dyn OrderSource>, order_id: Uuid, config: TrackingConfig) -> Self {
        let (tx, rx) = watch::channel(TrackingState::Connecting);
        let handle = tokio::spawn(run(source, order_id, config, tx));
        Self { rx, handle }
    }

    /// Watch the held state. The receiver keeps working after the task
    /// ends on a terminal order state.
    pub fn state(&self) -> watch::Receiver<TrackingState> {
        self.rx.clone()
    }

    /// Tear down both transports.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for OrderTracker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    source: Arc<dyn OrderSource>,
    order_id: Uuid,
    config: TrackingConfig,
    tx: watch::Sender<TrackingState>,
) {
    let mut held: Option<OrderSnapshot> = None;
    let mut misses = 0u32;

    let mut push: Option<OrderStream> = match source.subscribe(order_id).await {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(order = %order_id, error = %err, "push subscribe failed, poll only");
            None
        }
    };

    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let incoming = tokio::select! {
            pushed = next_push(&mut push) => match pushed {
                Some(snapshot) => Some(snapshot),
                None => {
                    debug!(order = %order_id, "push stream closed, poll only");
                    push = None;
                    continue;
                }
            },
            _ = poll.tick() => match source.fetch(order_id).await {
                Ok(Some(snapshot)) => Some(snapshot),
                Ok(None) => {
                    misses += 1;
                    // Only the crossing tick publishes; repeated misses
                    // would otherwise wake subscribers with no change.
                    if misses == config.not_found_threshold {
                        let _ = tx.send(TrackingState::NotFound);
                    }
                    None
                }
                Err(err) => {
                    // Swallowed: the next tick (or a push) retries.
                    warn!(order = %order_id, error = %err, "poll fetch failed");
                    None
                }
            },
        };

        let Some(snapshot) = incoming else { continue };
        misses = 0;

        match merge(held.as_ref(), &snapshot) {
            Merge::Applied => {
                let terminal = snapshot.status.is_terminal();
                held = Some(snapshot.clone());
                let _ = tx.send(TrackingState::Tracking(snapshot));
                if terminal {
                    // Nothing can follow a terminal state; end the task
                    // and both transports with it.
                    break;
                }
            }
            decision => {
                debug!(order = %order_id, ?decision, status = %snapshot.status, "snapshot ignored");
            }
        }
    }
}

async fn next_push(push: &mut Option<OrderStream>) -> Option<OrderSnapshot> {
    match push {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
