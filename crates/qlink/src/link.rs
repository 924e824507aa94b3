//! The link layer: unified API over validation, correlation and generation.
//!
//! Requests are validated, registered with the correlator and handed to the
//! entanglement generator. Responses coming back from the generator are
//! validated and folded into their exchanges.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use qlink_core::{
    creator_node_id, validate_request, validate_response, Directed, ErrorCode, NodeId, Request,
    Response,
};
use qlink_correlator::{Correlator, CorrelatorConfig, IngestOutcome, SubmitOutcome};
use qlink_magic::EntanglementGenerator;

use crate::error::{LinkError, Result};

/// Configuration for the link layer.
#[derive(Debug, Clone)]
pub struct LinkLayerConfig {
    /// Correlator configuration.
    pub correlator: CorrelatorConfig,
    /// How often [`LinkLayer::run`] checks deadlines.
    pub tick_interval: Duration,
    /// Default wait used by [`LinkLayer::poll_once`].
    pub poll_timeout: Duration,
}

impl Default for LinkLayerConfig {
    fn default() -> Self {
        Self {
            correlator: CorrelatorConfig::default(),
            tick_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// The link-layer interface of one node.
///
/// Provides a unified API for:
/// - Submitting create and receive-window requests
/// - Folding generator responses into exchange state
/// - Timing out requests whose `max_time` lapsed
pub struct LinkLayer<G: EntanglementGenerator> {
    /// The entanglement generator.
    generator: Arc<G>,
    /// Exchange state for this node.
    correlator: Correlator,
    /// Configuration.
    config: LinkLayerConfig,
    /// Zero of the link-layer clock.
    epoch: Instant,
}

impl<G: EntanglementGenerator> LinkLayer<G> {
    /// Create a link layer on top of `generator`.
    pub fn new(generator: G, config: LinkLayerConfig) -> Self {
        let correlator = Correlator::new(generator.local_node_id(), config.correlator.clone());
        Self {
            generator: Arc::new(generator),
            correlator,
            config,
            epoch: Instant::now(),
        }
    }

    /// Get the local node's identity.
    pub fn local_node_id(&self) -> NodeId {
        self.correlator.local_node_id()
    }

    /// Get the generator reference.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Get the correlator reference.
    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    /// Microseconds on the link-layer clock.
    pub fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Resolve the creator of `record` as seen from this node.
    pub fn creator_node_id<R: Directed + ?Sized>(&self, record: &R) -> NodeId {
        creator_node_id(self.local_node_id(), record)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Requests
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a request.
    ///
    /// If the generator refuses the hand-off, the exchange is failed with
    /// `OTHER` and the generator's error is returned. A refused receive-window
    /// request leaves the local windows untouched.
    pub async fn submit(&self, request: Request) -> Result<SubmitOutcome> {
        let validated = validate_request(&request).map_err(|e| {
            tracing::warn!("Invalid request: {}", e);
            e
        })?;

        if matches!(request, Request::Receive(_) | Request::StopReceive(_)) {
            if let Err(e) = self.generator.submit(None, &validated).await {
                tracing::warn!("Generator refused receive window: {}", e);
                return Err(e.into());
            }
            return Ok(self.correlator.submit(&validated, self.now())?);
        }

        let outcome = self.correlator.submit(&validated, self.now())?;
        let create_id = outcome.key().map(|key| key.create_id);

        if let Err(e) = self.generator.submit(create_id, &validated).await {
            tracing::warn!("Generator refused request: {}", e);
            if let Some(create_id) = create_id {
                if let Err(fail) = self.correlator.fail(create_id, ErrorCode::Other, self.now()) {
                    tracing::debug!("Exchange {} not failed: {}", create_id, fail);
                }
            }
            return Err(e.into());
        }

        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Responses
    // ─────────────────────────────────────────────────────────────────────────

    /// Receive one response from the generator and fold it in.
    ///
    /// Returns `Ok(None)` on timeout or when the response was dropped.
    pub async fn poll(&self, timeout: Duration) -> Result<Option<IngestOutcome>> {
        match self.generator.recv_timeout(timeout).await? {
            Some(raw) => self.ingest(raw),
            None => Ok(None),
        }
    }

    /// [`poll`](Self::poll) with the configured timeout.
    pub async fn poll_once(&self) -> Result<Option<IngestOutcome>> {
        self.poll(self.config.poll_timeout).await
    }

    /// Validate a raw response and fold it into its exchange.
    ///
    /// Records violating the schema and soft correlation errors are logged
    /// and dropped.
    pub fn ingest(&self, raw: Response) -> Result<Option<IngestOutcome>> {
        let validated = match validate_response(&raw) {
            Ok(validated) => validated,
            Err(e) => {
                tracing::warn!("Invalid response for create id {}: {}", raw.create_id(), e);
                return Ok(None);
            }
        };

        match self.correlator.ingest_response(validated, self.now()) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_soft() => {
                tracing::warn!("Dropped response: {}", e);
                Ok(None)
            }
            Err(e) => Err(LinkError::Correlation(e)),
        }
    }

    /// Apply deadlines on the link-layer clock.
    pub fn tick(&self) -> Vec<IngestOutcome> {
        self.correlator.tick(self.now())
    }

    /// Drive the link layer until `shutdown` turns true or its sender is dropped.
    ///
    /// Every outcome is forwarded to `outcomes`; the loop also stops once
    /// that receiver is gone.
    pub async fn run(
        &self,
        outcomes: mpsc::Sender<IngestOutcome>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!("Link layer {} running", self.local_node_id());

        while !*shutdown.borrow() {
            let produced = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => self.tick(),
                received = self.generator.recv() => {
                    self.ingest(received?)?.into_iter().collect()
                }
            };

            for outcome in produced {
                if outcomes.send(outcome).await.is_err() {
                    tracing::debug!("Outcome receiver dropped, stopping");
                    return Ok(());
                }
            }
        }

        tracing::debug!("Link layer {} stopped", self.local_node_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_core::{CreateRequestBuilder, PurposeId, ReceiveParams};
    use qlink_correlator::ExchangeState;
    use qlink_magic::{MagicConfig, MagicLinkLayer, MagicNetwork};

    fn pair_of_layers() -> (LinkLayer<MagicLinkLayer>, LinkLayer<MagicLinkLayer>) {
        let network = MagicNetwork::new(MagicConfig {
            seed: Some(11),
            ..MagicConfig::default()
        });
        (
            LinkLayer::new(network.create_link_layer(NodeId(1)), LinkLayerConfig::default()),
            LinkLayer::new(network.create_link_layer(NodeId(2)), LinkLayerConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_request() {
        let (alice, _bob) = pair_of_layers();
        let request = CreateRequestBuilder::keep(NodeId(2), PurposeId(0))
            .minimum_fidelity(2.0)
            .into_request();
        let err = alice.submit(request).await.unwrap_err();
        assert!(matches!(err, LinkError::Schema(_)));
        assert_eq!(alice.correlator().open_exchanges(), 0);
    }

    #[tokio::test]
    async fn test_single_pair_fulfilled() {
        let (alice, bob) = pair_of_layers();
        bob.submit(Request::Receive(ReceiveParams::new(NodeId(1), PurposeId(0))))
            .await
            .unwrap();

        let outcome = alice
            .submit(CreateRequestBuilder::keep(NodeId(2), PurposeId(0)).into_request())
            .await
            .unwrap();
        let key = outcome.key().unwrap();

        let ingested = alice.poll_once().await.unwrap().unwrap();
        assert_eq!(ingested.key, key);
        assert_eq!(ingested.state, ExchangeState::Fulfilled);

        let at_alice = ingested.released[0].response.response();
        assert_eq!(alice.creator_node_id(at_alice), NodeId(1));

        let passive = bob.poll_once().await.unwrap().unwrap();
        assert_eq!(passive.key, key);
        let at_bob = passive.released[0].response.response();
        assert_eq!(bob.creator_node_id(at_bob), NodeId(1));
    }
}
