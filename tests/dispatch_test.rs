//! End-to-end: dispatcher queue -> worker -> provider exchange -> provider queues

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use dispatchbox::config::{Config, SourcesConfig};
use dispatchbox::dispatch::Dispatcher;
use dispatchbox::messaging::{HEADER_CORRELATION_ID, HEADER_SUB_QUERY, Message};
use dispatchbox::models::{MusicRequest, ProviderOperation};
use dispatchbox::observability::Metrics;
use dispatchbox::queue::{Broker, QueueReceiver};
use dispatchbox::sources::{Operation, SourceChain};
use dispatchbox::worker::{DispatchWorker, WorkerConfig, WorkerReport};

const WAIT: Duration = Duration::from_secs(5);

struct Pipeline {
    broker: Arc<Broker>,
    metrics: Arc<Metrics>,
    providers: Vec<QueueReceiver>,
    shutdown: watch::Sender<bool>,
    worker: JoinHandle<WorkerReport>,
}

impl Pipeline {
    fn start(config: Config) -> Self {
        let chain = Arc::new(SourceChain::from_config(&config.sources).unwrap());
        let (broker, consumers) = Broker::declare(&config);
        let broker = Arc::new(broker);
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Arc::new(Dispatcher::new(
            chain,
            broker.provider_exchange(),
            metrics.clone(),
            &config.queues.routing_namespace,
        ));

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = DispatchWorker::new(dispatcher, broker.clone(), WorkerConfig::from_config(&config));
        let worker = tokio::spawn(worker.run(consumers.dispatcher, shutdown_rx));

        Self {
            broker,
            metrics,
            providers: consumers.providers,
            shutdown,
            worker,
        }
    }

    async fn submit(&self, request: &MusicRequest) {
        let message = Message::json("dispatch", request)
            .unwrap()
            .with_header(HEADER_CORRELATION_ID, &request.uuid);
        self.broker.enqueue(message).await.unwrap();
    }

    fn provider(&mut self, name: &str) -> &mut QueueReceiver {
        self.providers
            .iter_mut()
            .find(|queue| queue.name() == name)
            .unwrap()
    }

    async fn wait_for_dispatches(&self, count: u64) {
        tokio::time::timeout(WAIT, async {
            loop {
                let snapshot = self.metrics.snapshot();
                if snapshot.dispatch_success + snapshot.dispatch_fail >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    async fn stop(self) -> WorkerReport {
        self.shutdown.send(true).unwrap();
        let report = self.worker.await.unwrap();
        self.broker.close();
        report
    }
}

fn request(uuid: &str, queries: &[&str]) -> MusicRequest {
    MusicRequest::builder()
        .uuid(uuid)
        .server_id("248017453917011968")
        .query(queries.iter().map(|q| q.to_string()).collect())
        .build()
}

fn operations(queue: &mut QueueReceiver) -> Vec<ProviderOperation> {
    queue
        .drain()
        .into_iter()
        .map(|delivery| serde_json::from_slice(&delivery.message.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_mixed_request_reaches_each_provider() {
    let config = Config {
        sources: SourcesConfig {
            video_markers: vec!["video.example".to_string()],
            ..SourcesConfig::default()
        },
        ..Config::default()
    };
    let mut pipeline = Pipeline::start(config);

    pipeline
        .submit(&request(
            "req-mixed",
            &[
                "https://spotify.com/track/1",
                "hello world",
                "https://video.example/watch?v=1&list=2",
            ],
        ))
        .await;
    pipeline.wait_for_dispatches(1).await;

    let spotify = operations(pipeline.provider("spotify"));
    assert_eq!(spotify.len(), 1);
    assert_eq!(spotify[0].provider, "provider.spotify.url");
    assert_eq!(spotify[0].operation, Operation::Url);
    assert_eq!(spotify[0].query, "https://spotify.com/track/1");

    let video = operations(pipeline.provider("video"));
    let keys: Vec<_> = video.iter().map(|op| op.provider.as_str()).collect();
    assert_eq!(keys, vec!["provider.video.query", "provider.video.playlist"]);
    assert!(video.iter().all(|op| op.uuid == "req-mixed"));

    let snapshot = pipeline.metrics.snapshot();
    assert_eq!(snapshot.dispatch_success, 1);
    assert_eq!(snapshot.published, 3);

    let report = pipeline.stop().await;
    assert_eq!(report.acked, 1);
}

#[tokio::test]
async fn test_operations_carry_correlation_headers() {
    let mut pipeline = Pipeline::start(Config::default());

    pipeline.submit(&request("req-headers", &["a", "b"])).await;
    pipeline.wait_for_dispatches(1).await;

    let deliveries = pipeline.provider("video").drain();
    assert_eq!(deliveries.len(), 2);
    for (delivery, query) in deliveries.iter().zip(["a", "b"]) {
        assert_eq!(delivery.message.routing_key, "provider.video.query");
        assert_eq!(delivery.message.header(HEADER_CORRELATION_ID), Some("req-headers"));
        assert_eq!(delivery.message.header(HEADER_SUB_QUERY), Some(query));
    }

    pipeline.stop().await;
}

#[tokio::test]
async fn test_empty_request_publishes_nothing() {
    let mut pipeline = Pipeline::start(Config::default());

    pipeline.submit(&request("req-empty", &[])).await;
    pipeline.submit(&request("req-blank", &[""])).await;
    pipeline.wait_for_dispatches(2).await;

    assert!(pipeline.provider("spotify").is_empty());
    assert!(pipeline.provider("video").is_empty());

    let snapshot = pipeline.metrics.snapshot();
    assert_eq!(snapshot.dispatch_fail, 1);
    assert_eq!(snapshot.dispatch_success, 1);
    assert_eq!(snapshot.published, 0);

    let report = pipeline.stop().await;
    assert_eq!(report.acked, 2);
}

#[tokio::test]
async fn test_wildcard_binding_sees_every_operation() {
    let mut config = Config::default();
    config
        .providers
        .insert("audit".to_string(), "provider.#".to_string());
    let mut pipeline = Pipeline::start(config);

    pipeline
        .submit(&request(
            "req-audit",
            &["https://open.spotify.com/track/1", "some song"],
        ))
        .await;
    pipeline.wait_for_dispatches(1).await;

    assert_eq!(operations(pipeline.provider("audit")).len(), 2);
    assert_eq!(operations(pipeline.provider("spotify")).len(), 1);
    assert_eq!(operations(pipeline.provider("video")).len(), 1);

    pipeline.stop().await;
}
