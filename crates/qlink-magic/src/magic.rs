//! An in-memory magic link layer.
//!
//! Pairs are produced instantly and perfectly by fiat. Nodes share a
//! [`MagicNetwork`]; each node talks to it through a [`MagicLinkLayer`] that
//! implements [`EntanglementGenerator`]. Useful for tests and for driving the
//! link-layer interface without a physical simulator.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use qlink_core::{
    Basis, BasisChoice, BellState, CreateId, ErrorCode, ErrorResponse, KeepOk, LogicalQubitId,
    MeasureOk, NodeId, OkParams, PurposeId, ReceiveParams, Request, Response, StatePrepOk,
    ValidatedRequest,
};

use crate::error::{GeneratorError, Result};
use crate::generator::EntanglementGenerator;

/// Configuration for a magic network.
#[derive(Debug, Clone)]
pub struct MagicConfig {
    /// RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Fidelity reported for every pair.
    pub goodness: f64,

    /// Qubits each node can hold at once; bounds atomic requests.
    pub memory_qubits: u16,

    /// Nominal generation time per pair, in microseconds.
    pub pair_time_us: u64,

    /// Responses buffered per node. A request whose responses do not fit is
    /// refused with [`GeneratorError::ChannelFull`].
    pub channel_capacity: usize,
}

impl Default for MagicConfig {
    fn default() -> Self {
        Self {
            seed: None,
            goodness: 0.9,
            memory_qubits: 2,
            pair_time_us: 1_000,
            channel_capacity: 1_000,
        }
    }
}

struct NodeSlot {
    sender: mpsc::Sender<Response>,

    /// Receive windows: (peer, purpose).
    windows: HashSet<(NodeId, PurposeId)>,
}

/// Shared state for the magic network.
pub struct MagicNetwork {
    config: MagicConfig,
    nodes: RwLock<HashMap<NodeId, NodeSlot>>,
    rng: Mutex<StdRng>,
    epoch: Instant,
}

impl MagicNetwork {
    /// Create a new magic network.
    pub fn new(config: MagicConfig) -> Arc<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Arc::new(Self {
            config,
            nodes: RwLock::new(HashMap::new()),
            rng: Mutex::new(rng),
            epoch: Instant::now(),
        })
    }

    /// Attach a node to this network.
    ///
    /// Attaching an existing node replaces its channel and clears its windows.
    pub fn create_link_layer(self: &Arc<Self>, node_id: NodeId) -> MagicLinkLayer {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        self.nodes.write().insert(
            node_id,
            NodeSlot {
                sender: tx,
                windows: HashSet::new(),
            },
        );

        MagicLinkLayer {
            node_id,
            network: Arc::clone(self),
            receiver: tokio::sync::Mutex::new(rx),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &MagicConfig {
        &self.config
    }

    fn now_us(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    fn set_window(&self, node: NodeId, params: &ReceiveParams, open: bool) -> Result<()> {
        let mut nodes = self.nodes.write();
        let slot = nodes
            .get_mut(&node)
            .ok_or(GeneratorError::UnknownPeer(node))?;

        let window = (params.remote_node_id, params.purpose_id);
        if open {
            slot.windows.insert(window);
        } else {
            slot.windows.remove(&window);
        }
        Ok(())
    }

    fn handle(
        &self,
        origin: NodeId,
        create_id: Option<CreateId>,
        request: &ValidatedRequest,
    ) -> Result<()> {
        let inner = request.request();
        let create = match inner {
            Request::Receive(params) => return self.set_window(origin, params, true),
            Request::StopReceive(params) => return self.set_window(origin, params, false),
            other => match other.create_params() {
                Some(create) => create,
                None => return Ok(()),
            },
        };
        let create_id = create_id.ok_or(GeneratorError::MissingCreateId)?;
        let peer = create.remote_node_id;

        let (origin_tx, peer_tx, receiving) = {
            let nodes = self.nodes.read();
            let origin_slot = nodes.get(&origin).ok_or(GeneratorError::UnknownPeer(origin))?;
            let peer_slot = nodes.get(&peer).ok_or(GeneratorError::UnknownPeer(peer))?;
            (
                origin_slot.sender.clone(),
                peer_slot.sender.clone(),
                peer_slot.windows.contains(&(origin, create.purpose_id)),
            )
        };

        let refusal = if !receiving {
            Some(ErrorCode::Rejected)
        } else if create.atomic && create.number > self.config.memory_qubits {
            Some(ErrorCode::NoResources)
        } else if create.minimum_fidelity > self.config.goodness {
            Some(ErrorCode::Unsupported)
        } else {
            None
        };

        if let Some(code) = refusal {
            tracing::debug!(%origin, %peer, %create_id, ?code, "magic request refused");
            let error = ErrorResponse::unranged(create_id, code, origin);
            return deliver(&origin_tx, origin, Response::Error(error));
        }

        // Delivery never waits on a full channel.
        let number = usize::from(create.number);
        let needed = if origin == peer { 2 * number } else { number };
        ensure_room(&origin_tx, origin, needed)?;
        ensure_room(&peer_tx, peer, needed)?;

        let pairs = self.generate(origin, create_id, inner);
        tracing::debug!(%origin, %peer, %create_id, pairs = pairs.len(), "magic pairs generated");

        for (at_origin, at_peer) in pairs {
            deliver(&origin_tx, origin, at_origin)?;
            deliver(&peer_tx, peer, at_peer)?;
        }
        Ok(())
    }

    /// Produce the responses for both endpoints, one entry per pair.
    fn generate(
        &self,
        origin: NodeId,
        create_id: CreateId,
        request: &Request,
    ) -> Vec<(Response, Response)> {
        let create = match request.create_params() {
            Some(create) => create,
            None => return Vec::new(),
        };

        let mut rng = self.rng.lock();
        let base = self.now_us();
        let mut pairs = Vec::with_capacity(usize::from(create.number));

        for seq in 0..create.number {
            let bell_state = BellState::ALL[rng.gen_range(0..BellState::ALL.len())];
            let at_origin = OkParams {
                create_id,
                directionality_flag: false,
                sequence_number: seq,
                purpose_id: create.purpose_id,
                remote_node_id: create.remote_node_id,
                goodness: self.config.goodness,
                bell_state,
            };
            let at_peer = OkParams {
                directionality_flag: true,
                remote_node_id: origin,
                ..at_origin.clone()
            };

            let pair = match request {
                Request::CreateAndKeep(_) => {
                    let logical_qubit_id = LogicalQubitId(seq % self.config.memory_qubits.max(1));
                    let time_of_goodness = base + (u64::from(seq) + 1) * self.config.pair_time_us;
                    (
                        Response::CreateAndKeep(KeepOk {
                            pair: at_origin,
                            logical_qubit_id,
                            time_of_goodness,
                        }),
                        Response::CreateAndKeep(KeepOk {
                            pair: at_peer,
                            logical_qubit_id,
                            time_of_goodness,
                        }),
                    )
                }
                Request::MeasureDirectly(measure) => {
                    let origin_basis = sample_basis(&mut *rng, &measure.local());
                    let peer_basis = sample_basis(&mut *rng, &measure.remote());
                    let origin_outcome: bool = rng.gen();
                    let peer_outcome = match outcomes_agree(bell_state, origin_basis, peer_basis) {
                        Some(true) => origin_outcome,
                        Some(false) => !origin_outcome,
                        None => rng.gen(),
                    };
                    (
                        Response::MeasureDirectly(MeasureOk {
                            pair: at_origin,
                            measurement_outcome: origin_outcome,
                            measurement_basis: origin_basis,
                        }),
                        Response::MeasureDirectly(MeasureOk {
                            pair: at_peer,
                            measurement_outcome: peer_outcome,
                            measurement_basis: peer_basis,
                        }),
                    )
                }
                Request::RemoteStatePrep(_) => (
                    Response::RemoteStatePrep(StatePrepOk {
                        pair: at_origin,
                        measurement_outcome: rng.gen(),
                    }),
                    Response::RemoteStatePrep(StatePrepOk {
                        pair: at_peer,
                        measurement_outcome: false,
                    }),
                ),
                Request::Receive(_) | Request::StopReceive(_) => break,
            };
            pairs.push(pair);
        }

        pairs
    }
}

fn ensure_room(sender: &mpsc::Sender<Response>, node: NodeId, needed: usize) -> Result<()> {
    if sender.is_closed() {
        return Err(GeneratorError::ChannelClosed(node));
    }
    if sender.capacity() < needed {
        tracing::warn!(%node, needed, room = sender.capacity(), "response channel full");
        return Err(GeneratorError::ChannelFull(node));
    }
    Ok(())
}

fn deliver(sender: &mpsc::Sender<Response>, node: NodeId, response: Response) -> Result<()> {
    sender.try_send(response).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => GeneratorError::ChannelFull(node),
        mpsc::error::TrySendError::Closed(_) => GeneratorError::ChannelClosed(node),
    })
}

/// Draw a measurement basis from a basis selection.
pub fn sample_basis<R: Rng + ?Sized>(rng: &mut R, choice: &BasisChoice) -> Basis {
    let outcomes = choice.random_basis.outcomes();
    let last = match outcomes.last() {
        Some(last) => *last,
        None => return Basis::Z,
    };

    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (basis, p) in outcomes.iter().zip(choice.probability_dist) {
        cumulative += p;
        if draw < cumulative {
            return *basis;
        }
    }
    last
}

/// Whether both ends of `bell_state` measure equal outcomes in the given bases.
///
/// `None` when the outcomes are uncorrelated.
pub fn outcomes_agree(bell_state: BellState, a: Basis, b: Basis) -> Option<bool> {
    if a != b {
        return None;
    }
    let agree = match (a, bell_state) {
        (Basis::Z, BellState::PhiPlus | BellState::PhiMinus) => true,
        (Basis::Z, BellState::PsiPlus | BellState::PsiMinus) => false,
        (Basis::X, BellState::PhiPlus | BellState::PsiPlus) => true,
        (Basis::X, BellState::PhiMinus | BellState::PsiMinus) => false,
        (Basis::Y, BellState::PhiMinus | BellState::PsiPlus) => true,
        (Basis::Y, BellState::PhiPlus | BellState::PsiMinus) => false,
        _ => return None,
    };
    Some(agree)
}

/// A node's handle on a [`MagicNetwork`].
pub struct MagicLinkLayer {
    node_id: NodeId,
    network: Arc<MagicNetwork>,
    receiver: tokio::sync::Mutex<mpsc::Receiver<Response>>,
}

impl MagicLinkLayer {
    /// The network this node is attached to.
    pub fn network(&self) -> &Arc<MagicNetwork> {
        &self.network
    }
}

#[async_trait]
impl EntanglementGenerator for MagicLinkLayer {
    async fn submit(&self, create_id: Option<CreateId>, request: &ValidatedRequest) -> Result<()> {
        self.network.handle(self.node_id, create_id, request)
    }

    async fn recv(&self) -> Result<Response> {
        let mut rx = self.receiver.lock().await;
        rx.recv()
            .await
            .ok_or(GeneratorError::ChannelClosed(self.node_id))
    }

    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Response>> {
        let mut rx = self.receiver.lock().await;
        match tokio::time::timeout(timeout, rx.recv()).await {
            Ok(Some(response)) => Ok(Some(response)),
            Ok(None) => Err(GeneratorError::ChannelClosed(self.node_id)),
            Err(_) => Ok(None),
        }
    }

    fn local_node_id(&self) -> NodeId {
        self.node_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlink_core::{
        validate_request, CreateRequestBuilder, RandomBasis, ReturnType,
    };

    const A: NodeId = NodeId(1);
    const B: NodeId = NodeId(2);
    const PURPOSE: PurposeId = PurposeId(5);
    const WAIT: Duration = Duration::from_millis(50);

    fn network(seed: u64) -> (MagicLinkLayer, MagicLinkLayer) {
        let network = MagicNetwork::new(MagicConfig {
            seed: Some(seed),
            ..MagicConfig::default()
        });
        (network.create_link_layer(A), network.create_link_layer(B))
    }

    async fn open_window(at: &MagicLinkLayer, peer: NodeId) {
        let recv = validate_request(&Request::Receive(ReceiveParams::new(peer, PURPOSE))).unwrap();
        at.submit(None, &recv).await.unwrap();
    }

    async fn drain(at: &MagicLinkLayer) -> Vec<Response> {
        let mut out = Vec::new();
        while let Some(response) = at.recv_timeout(WAIT).await.unwrap() {
            out.push(response);
        }
        out
    }

    #[tokio::test]
    async fn test_rejected_without_receive_window() {
        let (a, b) = network(1);
        let request = CreateRequestBuilder::keep(B, PURPOSE).build().unwrap();
        a.submit(Some(CreateId(0)), &request).await.unwrap();

        let response = a.recv().await.unwrap();
        let err = response.as_error().unwrap();
        assert_eq!(err.error_code, ErrorCode::Rejected);
        assert_eq!(err.origin_node_id, A);
        assert!(drain(&b).await.is_empty());
    }

    #[tokio::test]
    async fn test_pairs_delivered_to_both_ends() {
        let (a, b) = network(2);
        open_window(&b, A).await;

        let request = CreateRequestBuilder::keep(B, PURPOSE).number(2).build().unwrap();
        a.submit(Some(CreateId(3)), &request).await.unwrap();

        let at_a = drain(&a).await;
        let at_b = drain(&b).await;
        assert_eq!(at_a.len(), 2);
        assert_eq!(at_b.len(), 2);

        for (ra, rb) in at_a.iter().zip(&at_b) {
            let pa = ra.ok_params().unwrap();
            let pb = rb.ok_params().unwrap();
            assert_eq!(ra.return_type(), ReturnType::OkK);
            assert!(!pa.directionality_flag);
            assert!(pb.directionality_flag);
            assert_eq!(pa.remote_node_id, B);
            assert_eq!(pb.remote_node_id, A);
            assert_eq!(pa.create_id, CreateId(3));
            assert_eq!(pa.sequence_number, pb.sequence_number);
            assert_eq!(pa.bell_state, pb.bell_state);
        }
    }

    #[tokio::test]
    async fn test_atomic_beyond_memory_is_nores() {
        let (a, b) = network(3);
        open_window(&b, A).await;

        let request = CreateRequestBuilder::keep(B, PURPOSE)
            .number(3)
            .atomic(true)
            .build()
            .unwrap();
        a.submit(Some(CreateId(0)), &request).await.unwrap();

        let response = a.recv().await.unwrap();
        assert_eq!(response.as_error().unwrap().error_code, ErrorCode::NoResources);
    }

    #[tokio::test]
    async fn test_fidelity_beyond_goodness_is_unsupported() {
        let (a, b) = network(4);
        open_window(&b, A).await;

        let request = CreateRequestBuilder::keep(B, PURPOSE)
            .minimum_fidelity(0.95)
            .build()
            .unwrap();
        a.submit(Some(CreateId(0)), &request).await.unwrap();

        let response = a.recv().await.unwrap();
        assert_eq!(response.as_error().unwrap().error_code, ErrorCode::Unsupported);
    }

    #[tokio::test]
    async fn test_unknown_peer() {
        let (a, _b) = network(5);
        let request = CreateRequestBuilder::keep(NodeId(99), PURPOSE).build().unwrap();
        let err = a.submit(Some(CreateId(0)), &request).await.unwrap_err();
        assert!(matches!(err, GeneratorError::UnknownPeer(NodeId(99))));
    }

    #[tokio::test]
    async fn test_create_without_id() {
        let (a, _b) = network(6);
        let request = CreateRequestBuilder::keep(B, PURPOSE).build().unwrap();
        let err = a.submit(None, &request).await.unwrap_err();
        assert!(matches!(err, GeneratorError::MissingCreateId));
    }

    #[tokio::test]
    async fn test_full_channel_refuses_without_waiting() {
        let network = MagicNetwork::new(MagicConfig {
            seed: Some(9),
            channel_capacity: 4,
            ..MagicConfig::default()
        });
        let a = network.create_link_layer(A);
        let b = network.create_link_layer(B);
        open_window(&b, A).await;

        // Nobody drains `a`, so five pairs can never fit.
        let request = CreateRequestBuilder::keep(B, PURPOSE).number(5).build().unwrap();
        let submitted = tokio::time::timeout(
            Duration::from_secs(2),
            a.submit(Some(CreateId(0)), &request),
        )
        .await
        .expect("submit returns without waiting for room");
        assert!(matches!(submitted, Err(GeneratorError::ChannelFull(A))));
        assert!(drain(&a).await.is_empty());
        assert!(drain(&b).await.is_empty());

        let request = CreateRequestBuilder::keep(B, PURPOSE).number(4).build().unwrap();
        a.submit(Some(CreateId(1)), &request).await.unwrap();
        assert_eq!(drain(&a).await.len(), 4);
    }

    #[tokio::test]
    async fn test_stop_receive_closes_window() {
        let (a, b) = network(7);
        open_window(&b, A).await;
        let stop = validate_request(&Request::StopReceive(ReceiveParams::new(A, PURPOSE))).unwrap();
        b.submit(None, &stop).await.unwrap();

        let request = CreateRequestBuilder::keep(B, PURPOSE).build().unwrap();
        a.submit(Some(CreateId(0)), &request).await.unwrap();
        let response = a.recv().await.unwrap();
        assert_eq!(response.as_error().unwrap().error_code, ErrorCode::Rejected);
    }

    #[tokio::test]
    async fn test_measured_bases_follow_selection() {
        let (a, b) = network(8);
        open_window(&b, A).await;

        let request = CreateRequestBuilder::measure(B, PURPOSE)
            .number(20)
            .local_basis(BasisChoice::random(RandomBasis::Chsh, [0.5, 0.0]))
            .remote_basis(BasisChoice::random(RandomBasis::Xyz, [0.3, 0.3]))
            .build()
            .unwrap();
        a.submit(Some(CreateId(1)), &request).await.unwrap();

        for response in drain(&a).await {
            match response {
                Response::MeasureDirectly(ok) => {
                    assert!(RandomBasis::Chsh.admits(ok.measurement_basis))
                }
                other => panic!("expected OK_M, got {:?}", other),
            }
        }
        for response in drain(&b).await {
            match response {
                Response::MeasureDirectly(ok) => {
                    assert!(RandomBasis::Xyz.admits(ok.measurement_basis))
                }
                other => panic!("expected OK_M, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_seeded_networks_agree() {
        let bell_states = |responses: Vec<Response>| -> Vec<BellState> {
            responses
                .iter()
                .filter_map(|r| r.ok_params().map(|p| p.bell_state))
                .collect()
        };

        let mut runs = Vec::new();
        for _ in 0..2 {
            let (a, b) = network(42);
            open_window(&b, A).await;
            let request = CreateRequestBuilder::keep(B, PURPOSE).number(8).build().unwrap();
            a.submit(Some(CreateId(0)), &request).await.unwrap();
            runs.push(bell_states(drain(&a).await));
        }
        assert_eq!(runs[0], runs[1]);
    }

    #[test]
    fn test_sample_basis_degenerate() {
        let mut rng = StdRng::seed_from_u64(0);
        let fixed = BasisChoice::default();
        let always_x = BasisChoice::random(RandomBasis::Xz, [1.0, 0.0]);
        let always_z = BasisChoice::random(RandomBasis::Xz, [0.0, 0.0]);
        for _ in 0..32 {
            assert_eq!(sample_basis(&mut rng, &fixed), Basis::Z);
            assert_eq!(sample_basis(&mut rng, &always_x), Basis::X);
            assert_eq!(sample_basis(&mut rng, &always_z), Basis::Z);
        }
    }

    #[test]
    fn test_outcome_correlations() {
        assert_eq!(outcomes_agree(BellState::PhiPlus, Basis::Z, Basis::Z), Some(true));
        assert_eq!(outcomes_agree(BellState::PsiMinus, Basis::Z, Basis::Z), Some(false));
        assert_eq!(outcomes_agree(BellState::PsiMinus, Basis::X, Basis::X), Some(false));
        assert_eq!(outcomes_agree(BellState::PhiPlus, Basis::Y, Basis::Y), Some(false));
        assert_eq!(outcomes_agree(BellState::PhiPlus, Basis::X, Basis::Z), None);
        assert_eq!(outcomes_agree(BellState::PhiPlus, Basis::ZPlusX, Basis::ZPlusX), None);
    }
}
