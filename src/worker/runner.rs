//! Dispatcher queue consumer

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};

use super::WorkerConfig;
use crate::dispatch::Dispatcher;
use crate::messaging::{HEADER_DEATH_REASON, HEADER_REDELIVERY_COUNT, Message};
use crate::models::MusicRequest;
use crate::queue::{Broker, Delivery, QueueReceiver};

/// How a single delivery was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Acked,
    Requeued,
    DeadLettered,
    Parked,
    /// Settling itself failed, the message is gone
    Lost,
}

/// Tally of settled deliveries, returned when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub acked: usize,
    pub requeued: usize,
    pub dead_lettered: usize,
    pub parked: usize,
    pub lost: usize,
    /// In-flight dispatches cut off by the graceful timeout
    pub aborted: usize,
}

impl WorkerReport {
    fn record(&mut self, joined: Result<DeliveryOutcome, JoinError>) {
        match joined {
            Ok(DeliveryOutcome::Acked) => self.acked += 1,
            Ok(DeliveryOutcome::Requeued) => self.requeued += 1,
            Ok(DeliveryOutcome::DeadLettered) => self.dead_lettered += 1,
            Ok(DeliveryOutcome::Parked) => self.parked += 1,
            Ok(DeliveryOutcome::Lost) => self.lost += 1,
            Err(e) => {
                error!(error = %e, "Dispatch task panicked");
                self.lost += 1;
            }
        }
    }
}

pub struct DispatchWorker {
    dispatcher: Arc<Dispatcher>,
    broker: Arc<Broker>,
    config: WorkerConfig,
}

impl DispatchWorker {
    pub fn new(dispatcher: Arc<Dispatcher>, broker: Arc<Broker>, config: WorkerConfig) -> Self {
        Self {
            dispatcher,
            broker,
            config,
        }
    }

    /// Consume `queue` until `shutdown` flips or the queue closes
    ///
    /// At most `max_consumers` dispatches run at once. Settling a failed
    /// one (requeue, dead-letter, park) happens outside that bound. On
    /// shutdown no new delivery is taken; in-flight ones get
    /// `graceful_timeout` to finish and are aborted after that.
    pub async fn run(
        self,
        mut queue: QueueReceiver,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerReport {
        let semaphore = Arc::new(Semaphore::new(self.config.max_consumers.max(1)));
        let mut in_flight = JoinSet::new();
        let mut report = WorkerReport::default();

        info!(
            queue = queue.name(),
            max_consumers = self.config.max_consumers,
            max_redeliveries = self.config.max_redeliveries,
            "Dispatch worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                delivery = queue.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => {
                        info!(queue = queue.name(), "Queue closed");
                        break;
                    }
                },
            };

            let dispatcher = self.dispatcher.clone();
            let broker = self.broker.clone();
            let max_redeliveries = self.config.max_redeliveries;
            let span = info_span!("delivery", redelivery_count = delivery.redelivery_count);
            in_flight.spawn(
                async move {
                    settle(&dispatcher, &broker, delivery, max_redeliveries, permit).await
                }
                .instrument(span),
            );

            while let Some(joined) = in_flight.try_join_next() {
                report.record(joined);
            }
        }

        self.drain(in_flight, report).await
    }

    async fn drain(
        &self,
        mut in_flight: JoinSet<DeliveryOutcome>,
        mut report: WorkerReport,
    ) -> WorkerReport {
        let grace = self.config.graceful_timeout;
        info!(in_flight = in_flight.len(), ?grace, "Draining in-flight dispatches");

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = in_flight.join_next().await {
                report.record(joined);
            }
        })
        .await;

        if drained.is_err() {
            report.aborted = in_flight.len();
            warn!(
                remaining = report.aborted,
                "Graceful timeout elapsed, aborting in-flight dispatches"
            );
            in_flight.abort_all();
        }

        info!(?report, "Dispatch worker stopped");
        report
    }
}

async fn settle(
    dispatcher: &Dispatcher,
    broker: &Broker,
    delivery: Delivery,
    max_redeliveries: u32,
    permit: OwnedSemaphorePermit,
) -> DeliveryOutcome {
    let Delivery {
        message,
        redelivery_count,
    } = delivery;

    let request = match MusicRequest::decode(&message.body) {
        Ok(request) => request,
        Err(e) => {
            drop(permit);
            warn!(error = %e, "Undecodable request, parking");
            let message = message.with_header(HEADER_DEATH_REASON, e.to_string());
            return match broker.park(message).await {
                Ok(()) => {
                    dispatcher.metrics().dead_lettered();
                    DeliveryOutcome::Parked
                }
                Err(err) => {
                    error!(error = %err, "Failed to park request");
                    DeliveryOutcome::Lost
                }
            };
        }
    };

    let result = dispatcher.dispatch(&request).await;
    // Requeueing may wait on the dispatcher queue, which only drains while
    // the loop can take a permit.
    drop(permit);

    let e = match result {
        Ok(_) => return DeliveryOutcome::Acked,
        Err(e) => e,
    };

    if e.is_retryable() && redelivery_count < max_redeliveries {
        let attempt = redelivery_count + 1;
        warn!(uuid = %request.uuid, attempt, error = %e, "Dispatch failed, requeueing");
        let delivery = Delivery {
            message: message
                .clone()
                .with_header(HEADER_REDELIVERY_COUNT, attempt.to_string()),
            redelivery_count: attempt,
        };
        let err = match broker.requeue(delivery).await {
            Ok(()) => return DeliveryOutcome::Requeued,
            Err(err) => err,
        };

        error!(uuid = %request.uuid, error = %err, "Failed to requeue request, dead-lettering");
        let message = message.with_header(HEADER_REDELIVERY_COUNT, redelivery_count.to_string());
        let reason = format!("{e}; requeue failed: {err}");
        return dead_letter_or_park(dispatcher, broker, &request.uuid, message, reason).await;
    }

    error!(uuid = %request.uuid, redelivery_count, error = %e, "Dispatch kept failing, dead-lettering");
    let message = message.with_header(HEADER_REDELIVERY_COUNT, redelivery_count.to_string());
    dead_letter_or_park(dispatcher, broker, &request.uuid, message, e.to_string()).await
}

/// Dead-letter `message`, falling back to the parking lot
async fn dead_letter_or_park(
    dispatcher: &Dispatcher,
    broker: &Broker,
    uuid: &str,
    message: Message,
    reason: String,
) -> DeliveryOutcome {
    let message = message.with_header(HEADER_DEATH_REASON, reason);

    let err = match broker.dead_letter(message.clone()).await {
        Ok(()) => {
            dispatcher.metrics().dead_lettered();
            return DeliveryOutcome::DeadLettered;
        }
        Err(err) => err,
    };

    warn!(%uuid, error = %err, "Failed to dead-letter request, parking");
    match broker.park(message).await {
        Ok(()) => {
            dispatcher.metrics().dead_lettered();
            DeliveryOutcome::Parked
        }
        Err(err) => {
            error!(%uuid, error = %err, "Failed to park request, message dropped");
            DeliveryOutcome::Lost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::messaging::{
        MessageProducer, MessagingError, RecordingProducer, Result as MessagingResult,
    };
    use crate::observability::Metrics;
    use crate::queue::Consumers;
    use crate::sources::SourceChain;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        broker: Arc<Broker>,
        consumers: Option<Consumers>,
        metrics: Arc<Metrics>,
        worker: Option<DispatchWorker>,
    }

    fn harness(config: &Config, producer: Arc<dyn MessageProducer>) -> Harness {
        let (broker, consumers) = Broker::declare(config);
        let broker = Arc::new(broker);
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(SourceChain::with_defaults()),
            producer,
            metrics.clone(),
            &config.queues.routing_namespace,
        ));
        let worker = DispatchWorker::new(dispatcher, broker.clone(), WorkerConfig::from_config(config));

        Harness {
            broker,
            consumers: Some(consumers),
            metrics,
            worker: Some(worker),
        }
    }

    fn request_message(queries: &[&str]) -> Message {
        let request = MusicRequest::builder()
            .uuid("req-1")
            .server_id("42")
            .query(queries.iter().map(|q| q.to_string()).collect())
            .build();
        Message::json("dispatch", &request).unwrap()
    }

    struct StallingProducer {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl MessageProducer for StallingProducer {
        async fn publish(&self, _message: Message) -> MessagingResult<()> {
            self.started.notify_one();
            std::future::pending::<()>().await;
            Err(MessagingError::PublishFailed("unreachable".to_string()))
        }

        async fn health(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_failing_request_is_requeued_then_dead_lettered() {
        let mut config = Config::default();
        config.queues.max_redeliveries = 2;
        let mut h = harness(&config, Arc::new(RecordingProducer::failing_after(0)));
        let Consumers {
            dispatcher: queue,
            mut dead_letter,
            ..
        } = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(queue, shutdown_rx));

        h.broker.enqueue(request_message(&["song"])).await.unwrap();

        let dead = tokio::time::timeout(WAIT, dead_letter.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dead.message.routing_key, "dispatch.dead");
        assert_eq!(dead.message.header(HEADER_REDELIVERY_COUNT), Some("2"));
        assert!(dead.message.header(HEADER_DEATH_REASON).is_some());

        shutdown_tx.send(true).unwrap();
        let report = worker.await.unwrap();
        assert_eq!(report.requeued, 2);
        assert_eq!(report.dead_lettered, 1);
        assert_eq!(report.acked, 0);

        let snapshot = h.metrics.snapshot();
        assert_eq!(snapshot.publish_errors, 3);
        assert_eq!(snapshot.dead_lettered, 1);
        assert_eq!(snapshot.dispatch_success, 0);
    }

    #[tokio::test]
    async fn test_undecodable_requests_are_parked() {
        let config = Config::default();
        let mut h = harness(&config, Arc::new(RecordingProducer::new()));
        let Consumers {
            dispatcher: queue,
            mut parking_lot,
            ..
        } = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(queue, shutdown_rx));

        h.broker
            .enqueue(Message::new("dispatch", b"not json".to_vec()))
            .await
            .unwrap();
        h.broker
            .enqueue(Message::new(
                "dispatch",
                br#"{"uuid":"u","server_id":"0","query":["ok",7]}"#.to_vec(),
            ))
            .await
            .unwrap();

        for _ in 0..2 {
            let parked = tokio::time::timeout(WAIT, parking_lot.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(parked.message.header(HEADER_DEATH_REASON).is_some());
        }

        shutdown_tx.send(true).unwrap();
        let report = worker.await.unwrap();
        assert_eq!(report.parked, 2);
        assert_eq!(h.metrics.snapshot().dead_lettered, 2);
        assert_eq!(h.metrics.snapshot().dispatch_fail, 0);
    }

    #[tokio::test]
    async fn test_valid_request_is_acked() {
        let config = Config::default();
        let producer = Arc::new(RecordingProducer::new());
        let mut h = harness(&config, producer.clone());
        let consumers = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(consumers.dispatcher, shutdown_rx));

        h.broker
            .enqueue(request_message(&["a", "b"]))
            .await
            .unwrap();

        tokio::time::timeout(WAIT, async {
            while h.metrics.snapshot().dispatch_success == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        let report = worker.await.unwrap();
        assert_eq!(report.acked, 1);
        assert_eq!(producer.published().len(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_graceful_timeout() {
        let mut config = Config::default();
        config.broker.graceful_timeout_ms = 50;
        let started = Arc::new(Notify::new());
        let producer = Arc::new(StallingProducer {
            started: started.clone(),
        });
        let mut h = harness(&config, producer);
        let consumers = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(consumers.dispatcher, shutdown_rx));

        h.broker.enqueue(request_message(&["song"])).await.unwrap();
        tokio::time::timeout(WAIT, started.notified()).await.unwrap();

        shutdown_tx.send(true).unwrap();
        let report = tokio::time::timeout(WAIT, worker).await.unwrap().unwrap();
        assert_eq!(report.aborted, 1);
        assert_eq!(report.acked, 0);
    }

    #[tokio::test]
    async fn test_stops_immediately_when_idle() {
        let config = Config::default();
        let mut h = harness(&config, Arc::new(RecordingProducer::new()));
        let consumers = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(consumers.dispatcher, shutdown_rx));

        shutdown_tx.send(true).unwrap();
        let report = tokio::time::timeout(WAIT, worker).await.unwrap().unwrap();
        assert_eq!(report, WorkerReport::default());
    }

    #[tokio::test]
    async fn test_requeue_into_full_queue_loses_nothing() {
        let mut config = Config::default();
        config.broker.max_consumers = 1;
        config.broker.queue_capacity = 1;
        config.broker.publish_timeout_ms = 200;
        config.queues.max_redeliveries = 3;
        let mut h = harness(&config, Arc::new(RecordingProducer::failing_after(0)));
        let Consumers {
            dispatcher: queue,
            mut dead_letter,
            mut parking_lot,
            ..
        } = h.consumers.take().unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(h.worker.take().unwrap().run(queue, shutdown_rx));

        h.broker.enqueue(request_message(&["first"])).await.unwrap();
        h.broker.enqueue(request_message(&["second"])).await.unwrap();

        let mut settled = 0;
        tokio::time::timeout(WAIT, async {
            while settled < 2 {
                let delivery = tokio::select! {
                    Some(delivery) = dead_letter.recv() => delivery,
                    Some(delivery) = parking_lot.recv() => delivery,
                };
                assert!(delivery.message.header(HEADER_DEATH_REASON).is_some());
                settled += 1;
            }
        })
        .await
        .unwrap();

        shutdown_tx.send(true).unwrap();
        let report = worker.await.unwrap();
        assert_eq!(report.lost, 0);
        assert_eq!(report.dead_lettered + report.parked, 2);
        assert_eq!(h.metrics.snapshot().dead_lettered, 2);
    }

    #[tokio::test]
    async fn test_failed_requeue_falls_back_to_dead_letter() {
        let config = Config::default();
        let mut h = harness(&config, Arc::new(RecordingProducer::failing_after(0)));
        let Consumers {
            dispatcher: queue,
            mut dead_letter,
            ..
        } = h.consumers.take().unwrap();
        drop(queue);
        let worker = h.worker.take().unwrap();
        let permit = Arc::new(Semaphore::new(1)).acquire_owned().await.unwrap();

        let outcome = settle(
            &worker.dispatcher,
            &worker.broker,
            Delivery::new(request_message(&["song"])),
            3,
            permit,
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::DeadLettered);
        let dead = dead_letter.try_recv().unwrap();
        assert_eq!(dead.message.header(HEADER_REDELIVERY_COUNT), Some("0"));
        assert!(
            dead.message
                .header(HEADER_DEATH_REASON)
                .unwrap()
                .contains("requeue failed")
        );
        assert_eq!(h.metrics.snapshot().dead_lettered, 1);
    }
}
