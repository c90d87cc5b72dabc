//! El coordinador: arma el anillo, avanza las rondas en lock-step y decide cuándo cortar.

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, info_span, trace, warn};

use crate::error::{ConfigurationError, ElectionError};
use crate::report::ElectionOutcome;
use crate::ring_node::{NodeEvent, NodeGate, NodeReport, RingLink, RingNode};
use crate::termination::{default_round_bound, RoundLimit, TerminationPolicy};

pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(5);

/// Anillo ya validado más la política con la que se va a correr.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    uids: Vec<u32>,
    policy: TerminationPolicy,
    limit: RoundLimit,
    round_timeout: Duration,
}

impl SimulationConfig {
    /// Valida los uids en orden de anillo: la posición `i` tiene como sucesor a `i + 1 mod N`.
    pub fn new<I>(uids: I, policy: TerminationPolicy) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut ring = Vec::new();
        let mut seen = HashSet::new();
        for (position, uid) in uids.into_iter().enumerate() {
            if uid <= 0 {
                return Err(ConfigurationError::NonPositiveUid { position, uid });
            }
            let uid = u32::try_from(uid)
                .map_err(|_| ConfigurationError::UidOutOfRange { position, uid })?;
            if !seen.insert(uid) {
                return Err(ConfigurationError::DuplicateUid { uid });
            }
            ring.push(uid);
        }

        let min_uid = ring
            .iter()
            .copied()
            .min()
            .ok_or(ConfigurationError::EmptyRing)?;
        // con un max_rounds explícito la cota por defecto no hace falta
        let limit = match policy {
            TerminationPolicy::RoundBound {
                max_rounds: Some(0),
            } => return Err(ConfigurationError::ZeroRoundLimit),
            TerminationPolicy::RoundBound {
                max_rounds: Some(max_rounds),
            } => RoundLimit::Cutoff { max_rounds },
            _ => {
                let default_bound = default_round_bound(ring.len(), min_uid).ok_or(
                    ConfigurationError::RoundBoundOverflow {
                        ring_size: ring.len(),
                        min_uid,
                    },
                )?;
                RoundLimit::resolve(policy, default_bound)
            }
        };

        Ok(SimulationConfig {
            uids: ring,
            policy,
            limit,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        })
    }

    pub fn with_round_timeout(mut self, round_timeout: Duration) -> Self {
        self.round_timeout = round_timeout;
        self
    }

    pub fn uids(&self) -> &[u32] {
        &self.uids
    }

    pub fn policy(&self) -> TerminationPolicy {
        self.policy
    }

    pub fn limit(&self) -> RoundLimit {
        self.limit
    }

    pub fn round_timeout(&self) -> Duration {
        self.round_timeout
    }
}

/// Contador global de rondas. Nunca avanza con una ronda en vuelo.
#[derive(Debug, Default)]
struct RoundClock {
    round: u64,
    in_progress: bool,
}

impl RoundClock {
    fn next(&self) -> u64 {
        self.round + 1
    }

    fn begin(&mut self) -> u64 {
        debug_assert!(!self.in_progress, "la ronda {} sigue en vuelo", self.round);
        self.round += 1;
        self.in_progress = true;
        self.round
    }

    fn complete(&mut self) {
        self.in_progress = false;
    }

    fn completed(&self) -> u64 {
        if self.in_progress {
            self.round - 1
        } else {
            self.round
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Confirmation {
    uid: u32,
    round: u64,
}

#[derive(Debug, Default)]
struct Progress {
    clock: RoundClock,
    confirmation: Option<Confirmation>,
    messages: u64,
    decided: bool,
}

/// Los hilos vivos del anillo y el extremo receptor de sus avisos.
struct Ring {
    gates: Vec<Arc<NodeGate>>,
    handles: Vec<(u32, JoinHandle<Result<NodeReport, ElectionError>>)>,
    events: Receiver<NodeEvent>,
}

impl Ring {
    fn release(&self, round: u64) {
        for gate in &self.gates {
            gate.release(round);
        }
    }

    fn terminate(&self) {
        for gate in &self.gates {
            gate.terminate();
        }
    }

    /// Espera a todos los hilos aunque alguno falle; devuelve el primer error.
    fn join(self) -> Result<Vec<NodeReport>, ElectionError> {
        self.terminate();
        let results: Vec<Result<NodeReport, ElectionError>> = self
            .handles
            .into_iter()
            .map(|(uid, handle)| {
                handle
                    .join()
                    .map_err(|_| ElectionError::NodePanicked { uid })
                    .and_then(|report| report)
            })
            .collect();
        results.into_iter().collect()
    }
}

pub struct Coordinator {
    config: SimulationConfig,
}

impl Coordinator {
    pub fn new(config: SimulationConfig) -> Self {
        Coordinator { config }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Corre la elección completa: lanza N hilos, los sincroniza ronda a ronda y
    /// devuelve el resultado cuando la política decide cortar.
    pub fn run(&self) -> Result<ElectionOutcome, ElectionError> {
        let span = info_span!(
            "coordinator",
            ring_size = self.config.uids.len(),
            policy = %self.config.policy
        );
        let _enter = span.enter();

        let ring = self.spawn_ring()?;
        let mut progress = Progress::default();
        if let Err(err) = self.drive(&ring, &mut progress) {
            // los hilos que sigan esperando su compuerta salen; los trabados quedan sueltos
            ring.terminate();
            return Err(err);
        }

        let nodes = ring.join()?;
        self.conclude(progress, nodes)
    }

    fn spawn_ring(&self) -> Result<Ring, ElectionError> {
        let uids = &self.config.uids;
        let (events_tx, events_rx) = mpsc::channel();
        let (inboxes_tx, inboxes_rx): (Vec<_>, Vec<_>) = uids.iter().map(|_| mpsc::channel()).unzip();
        let gates: Vec<Arc<NodeGate>> = uids.iter().map(|_| Arc::new(NodeGate::default())).collect();

        let nodes: Vec<RingNode> = inboxes_rx
            .into_iter()
            .enumerate()
            .map(|(i, inbox)| {
                let next = (i + 1) % uids.len();
                let link = RingLink::new(uids[next], inboxes_tx[next].clone(), events_tx.clone());
                RingNode::new(uids[i], gates[i].clone(), inbox, link, events_tx.clone())
            })
            .collect();
        // sin este drop el canal nunca se cerraría aunque mueran todos los nodos
        drop(events_tx);
        drop(inboxes_tx);

        let mut handles = Vec::with_capacity(nodes.len());
        for (uid, node) in uids.iter().copied().zip(nodes) {
            let spawned = thread::Builder::new()
                .name(format!("nodo-{uid}"))
                .spawn(move || node.run());
            match spawned {
                Ok(handle) => handles.push((uid, handle)),
                Err(source) => {
                    for gate in &gates {
                        gate.terminate();
                    }
                    return Err(ElectionError::Spawn { uid, source });
                }
            }
        }
        info!(uids = ?uids, limit = ?self.config.limit, "anillo iniciado");

        Ok(Ring {
            gates,
            handles,
            events: events_rx,
        })
    }

    fn drive(&self, ring: &Ring, progress: &mut Progress) -> Result<(), ElectionError> {
        while !progress.decided {
            self.increment_round(ring, progress)?;
            if progress.clock.in_progress {
                self.await_round(ring, progress)?;
            }
        }
        Ok(())
    }

    /// Paso serializado de avance: decide terminar o libera a todos para la ronda siguiente.
    fn increment_round(&self, ring: &Ring, progress: &mut Progress) -> Result<(), ElectionError> {
        if progress.decided {
            return Ok(());
        }

        // el límite se mira antes de abrir la ronda: la que lo excede nunca se emite
        if self.config.limit.exceeded_by(progress.clock.next()) {
            match self.config.limit {
                RoundLimit::AwaitLeader { .. } => {
                    return Err(ElectionError::LeaderNeverConfirmed {
                        rounds: progress.clock.completed(),
                    });
                }
                RoundLimit::Cutoff { max_rounds } => {
                    debug!(max_rounds, "cota de rondas alcanzada");
                    progress.decided = true;
                    return Ok(());
                }
            }
        }

        let round = progress.clock.begin();
        trace!(round, "liberando nodos");
        ring.release(round);
        Ok(())
    }

    /// Barrera de entrada: cuenta N turnos terminados de la ronda en vuelo.
    fn await_round(&self, ring: &Ring, progress: &mut Progress) -> Result<(), ElectionError> {
        let round = progress.clock.round;
        let mut pending = ring.gates.len();

        while pending > 0 {
            match ring.events.recv_timeout(self.config.round_timeout) {
                Ok(NodeEvent::TurnCompleted { forwarded, .. }) => {
                    pending -= 1;
                    if forwarded {
                        progress.messages += 1;
                    }
                }
                Ok(NodeEvent::LeaderConfirmed { uid, round }) => {
                    if progress.confirmation.is_none() {
                        progress.confirmation = Some(Confirmation { uid, round });
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ElectionError::DeadlockTimeout { round });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ElectionError::Disconnected { round });
                }
            }
        }
        progress.clock.complete();

        // el aviso de líder siempre llega antes de que cierre la ronda que lo produjo
        if self.config.policy == TerminationPolicy::LeaderSignal && progress.confirmation.is_some() {
            progress.decided = true;
        }
        Ok(())
    }

    fn conclude(
        &self,
        progress: Progress,
        nodes: Vec<NodeReport>,
    ) -> Result<ElectionOutcome, ElectionError> {
        let rounds = progress.clock.completed();
        let believed = nodes
            .iter()
            .filter(|node| node.believes_leader())
            .map(|node| node.uid)
            .min();

        let leader_uid = match (progress.confirmation, believed) {
            (Some(confirmation), _) => confirmation.uid,
            (None, Some(uid)) => {
                warn!(uid, rounds, "corte antes de que volviera el token del líder");
                uid
            }
            (None, None) => return Err(ElectionError::LeaderNeverConfirmed { rounds }),
        };

        Ok(ElectionOutcome {
            leader_uid,
            confirmed_round: progress.confirmation.map(|confirmation| confirmation.round),
            rounds,
            messages: progress.messages,
            policy: self.config.policy,
            nodes,
        })
    }
}

/// Atajo: valida, corre y devuelve el resultado.
pub fn run_election<I>(uids: I, policy: TerminationPolicy) -> Result<ElectionOutcome, ElectionError>
where
    I: IntoIterator<Item = i64>,
{
    let config = SimulationConfig::new(uids, policy)?;
    Coordinator::new(config).run()
}
