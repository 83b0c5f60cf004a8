use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use super::channels::ChannelTable;
use super::events::{Broadcast, ChatEvent};

/// Error returned by [`Hub::publish`] once the intake queue has closed.
#[derive(Debug, PartialEq, Eq)]
pub struct IntakeClosed;

impl std::fmt::Display for IntakeClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "intake queue is closed")
    }
}

impl std::error::Error for IntakeClosed {}

/// The relay's single serializing dispatcher.
///
/// Every producer (login, logout, inbound chat, shutdown) publishes into one
/// bounded intake queue; the dispatch loop is its sole consumer and copies
/// each event into every registered outbox, so all attached clients observe
/// the same total order.
pub struct Hub {
    intake: RwLock<Option<mpsc::Sender<ChatEvent>>>,
    channels: Arc<ChannelTable>,
}

impl Hub {
    /// Build a hub plus the receiving end of its intake queue. The caller
    /// spawns [`Hub::run`] with the receiver exactly once.
    pub fn new(
        channels: Arc<ChannelTable>,
        intake_capacity: usize,
    ) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (tx, rx) = mpsc::channel(intake_capacity.max(1));
        (
            Self {
                intake: RwLock::new(Some(tx)),
                channels,
            },
            rx,
        )
    }

    /// Append an event to the intake queue, waiting while it is at capacity.
    ///
    /// The sender is cloned out of the lock before the send, so a publisher
    /// blocked on backpressure never holds up [`Hub::close_intake`].
    pub async fn publish(&self, event: ChatEvent) -> Result<(), IntakeClosed> {
        let tx = self.intake.read().await.clone();
        match tx {
            Some(tx) => tx.send(event).await.map_err(|_| IntakeClosed),
            None => Err(IntakeClosed),
        }
    }

    /// Close the intake queue for further writes. Once in-flight publishes
    /// finish, the dispatch loop drains what is left and stops.
    pub async fn close_intake(&self) {
        self.intake.write().await.take();
    }

    /// The dispatch loop: drain intake FIFO and copy each stamped event into
    /// every registered outbox. Runs until the intake queue is closed and
    /// empty.
    pub async fn run(self: Arc<Self>, mut intake: mpsc::Receiver<ChatEvent>) {
        let mut last_stamp = Utc::now();
        while let Some(event) = intake.recv().await {
            // Stamps follow intake order even if the wall clock steps back.
            let now = Utc::now();
            if now > last_stamp {
                last_stamp = now;
            }
            let frame = Broadcast {
                timestamp: last_stamp,
                event,
            };

            let targets = self.channels.snapshot().await;
            let recipients = targets.len();
            for (token, outbox) in targets {
                if outbox.push(frame.clone()).is_some() {
                    warn!(
                        token = %token,
                        total_drops = outbox.drop_count(),
                        "outbound queue full, dropped oldest frame"
                    );
                }
            }
            debug!(event = ?frame.event, recipients, "dispatched event");
        }
        info!("dispatch loop stopped");
    }
}
