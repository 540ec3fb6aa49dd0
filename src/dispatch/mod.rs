//! Request fan-out
//!
//! [`Dispatcher::dispatch`] classifies every query of a [`MusicRequest`] and
//! publishes one [`ProviderOperation`] per classified query, routed by its
//! `provider` key.
//!
//! Publishes are not transactional. When publish `k` of `n` fails the error
//! is returned as is; operations `0..k` are already out and the caller
//! retries the whole request. Consumers de-duplicate on
//! `(x-correlation-id, x-sub-query)`.

use std::sync::Arc;
use thiserror::Error;
use tracing::{Instrument, error, info, info_span, warn};

use crate::messaging::{
    HEADER_CORRELATION_ID, HEADER_SUB_QUERY, Message, MessageProducer, MessagingError,
};
use crate::models::{MusicRequest, ProviderOperation};
use crate::observability::Metrics;
use crate::sources::{SourceChain, SourcePair};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("encoding item {index} for '{provider}' failed: {source}")]
    Encode {
        index: usize,
        provider: String,
        #[source]
        source: MessagingError,
    },

    #[error("publishing item {index} to '{provider}' failed: {source}")]
    Publish {
        index: usize,
        provider: String,
        #[source]
        source: MessagingError,
    },
}

impl DispatchError {
    /// Whether redelivering the same request can succeed
    ///
    /// Broker rejections are transient; an operation that cannot be encoded
    /// fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Publish { .. })
    }
}

/// What a single dispatch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Number of source pairs produced by the chain
    pub classified: usize,
    /// Operations published, in query order
    pub published: Vec<ProviderOperation>,
    /// Queries nobody could classify, not published
    pub skipped: Vec<String>,
}

/// Classifies requests and publishes provider operations
///
/// Stateless apart from the shared counters; one instance serves every
/// concurrent dispatch.
pub struct Dispatcher {
    chain: Arc<SourceChain>,
    producer: Arc<dyn MessageProducer>,
    metrics: Arc<Metrics>,
    namespace: String,
}

impl Dispatcher {
    pub fn new(
        chain: Arc<SourceChain>,
        producer: Arc<dyn MessageProducer>,
        metrics: Arc<Metrics>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            producer,
            metrics,
            namespace: namespace.into(),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Classify and publish every query of `request`
    ///
    /// Counts one success when the chain produced at least one pair and one
    /// failure when the request had no queries. A failed publish counts
    /// neither and is returned to the caller.
    pub async fn dispatch(&self, request: &MusicRequest) -> Result<DispatchOutcome, DispatchError> {
        let span = info_span!(
            "dispatch",
            uuid = %request.uuid,
            server_id = %request.server_id,
            queries = request.query.len(),
        );

        async move {
            let pairs = info_span!("classify", shuffle = request.shuffle)
                .in_scope(|| self.chain.process_queries(&request.query, request.shuffle));

            if pairs.is_empty() {
                self.metrics.dispatch_failed();
                warn!("Request carried no queries");
                return Ok(DispatchOutcome::default());
            }

            let outcome = self
                .fan_out(request, &pairs)
                .instrument(info_span!("fan_out", items = pairs.len()))
                .await?;

            self.metrics.dispatch_succeeded();
            info!(
                published = outcome.published.len(),
                skipped = outcome.skipped.len(),
                "Request dispatched"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn fan_out(
        &self,
        request: &MusicRequest,
        pairs: &[SourcePair],
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut outcome = DispatchOutcome {
            classified: pairs.len(),
            ..DispatchOutcome::default()
        };

        for (index, pair) in pairs.iter().enumerate() {
            let Some(operation) = ProviderOperation::from_pair(request, pair, &self.namespace) else {
                warn!(index, sub_query = %pair.query, "No provider for query, skipping");
                outcome.skipped.push(pair.query.clone());
                continue;
            };

            let message = Message::json(&operation.provider, &operation)
                .map(|message| {
                    message
                        .with_header(HEADER_CORRELATION_ID, &operation.uuid)
                        .with_header(HEADER_SUB_QUERY, &operation.query)
                })
                .map_err(|source| {
                    error!(index, provider = %operation.provider, error = %source, "Encode failed");
                    DispatchError::Encode {
                        index,
                        provider: operation.provider.clone(),
                        source,
                    }
                })?;

            if let Err(source) = self.producer.publish(message).await {
                self.metrics.publish_failed();
                error!(index, provider = %operation.provider, error = %source, "Publish failed");
                return Err(DispatchError::Publish {
                    index,
                    provider: operation.provider,
                    source,
                });
            }

            self.metrics.operation_published();
            info!(
                index,
                sub_query = %operation.query,
                provider = %operation.provider,
                "Published provider operation"
            );
            outcome.published.push(operation);
        }

        Ok(outcome)
    }
}
