//! Consumer background worker.
//!
//! Drains the bus receiver and routes each verdict back to the transport:
//! acked deliveries are dropped, nacked deliveries are requeued for another
//! attempt.

use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::{Disposition, NotificationConsumer};
use crate::bus::BusReceiver;
use crate::stores::{DeliveryLedger, Mailer};

pub struct ConsumerWorker<L, M> {
    consumer: NotificationConsumer<L, M>,
    receiver: BusReceiver,
}

impl<L: DeliveryLedger, M: Mailer> ConsumerWorker<L, M> {
    pub fn new(consumer: NotificationConsumer<L, M>, receiver: BusReceiver) -> Self {
        Self { consumer, receiver }
    }

    /// Run until shutdown is signaled or the bus closes.
    #[instrument(skip(self, shutdown), name = "consumer_worker")]
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Starting notification consumer");

        loop {
            tokio::select! {
                maybe_delivery = self.receiver.recv() => {
                    match maybe_delivery {
                        Some(delivery) => {
                            match self.consumer.handle(&delivery).await {
                                Disposition::Ack => {}
                                Disposition::Nack => {
                                    if let Err(e) = self.receiver.redeliver(delivery) {
                                        error!(error = %e, "Failed to requeue nacked delivery");
                                    }
                                }
                            }
                        }
                        None => {
                            info!("Bus closed, stopping consumer");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Notification consumer shutting down");
                        break;
                    }
                }
            }
        }
    }
}
