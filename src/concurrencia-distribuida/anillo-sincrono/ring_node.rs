//! Un participante del anillo: su estado de elección y el hilo que lo ejecuta ronda a ronda.

use std::mem;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use std_semaphore::Semaphore;
use tracing::{debug, info, trace};

use crate::error::ElectionError;
use crate::termination::gate_period;

/// Lo que viaja de un nodo a su sucesor: el mínimo conocido y la ronda en que se envió.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub uid: u32,
    pub round: u64,
}

/// Avisos que los nodos le mandan al coordinador.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    TurnCompleted { uid: u32, round: u64, forwarded: bool },
    LeaderConfirmed { uid: u32, round: u64 },
}

/// Estado final de un nodo, devuelto al hacer join de su hilo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReport {
    pub uid: u32,
    pub min_seen: u32,
    pub min_seen_round: u64,
    pub forwarded: u64,
}

impl NodeReport {
    pub fn believes_leader(&self) -> bool {
        self.min_seen == self.uid
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionState {
    uid: u32,
    min_seen: u32,
    min_seen_round: u64,
}

impl ElectionState {
    pub fn new(uid: u32) -> Self {
        ElectionState {
            uid,
            min_seen: uid,
            min_seen_round: 0,
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn min_seen(&self) -> u32 {
        self.min_seen
    }

    pub fn min_seen_round(&self) -> u64 {
        self.min_seen_round
    }

    /// Compuerta de ronda: solo se reenvía en `min_seen_round + 2^min_seen`.
    pub fn may_forward(&self, round: u64) -> bool {
        gate_period(self.min_seen)
            .and_then(|period| self.min_seen_round.checked_add(period))
            .is_some_and(|valid_round| valid_round == round)
    }

    /// Incorpora un token ajeno. Devuelve `true` si bajó el mínimo.
    pub fn absorb(&mut self, token: Token) -> bool {
        if token.uid < self.min_seen {
            self.min_seen = token.uid;
            self.min_seen_round = token.round;
            true
        } else {
            false
        }
    }
}

/// Las banderas `released`/`terminated` de un nodo.
///
/// El coordinador escribe la ronda y libera un permiso; el nodo adquiere el
/// permiso y recién ahí lee la ronda o la orden de terminar.
pub struct NodeGate {
    released: Semaphore,
    current_round: AtomicU64,
    terminated: AtomicBool,
}

impl Default for NodeGate {
    fn default() -> Self {
        NodeGate {
            released: Semaphore::new(0),
            current_round: AtomicU64::new(0),
            terminated: AtomicBool::new(false),
        }
    }
}

impl NodeGate {
    pub fn release(&self, round: u64) {
        self.current_round.store(round, Ordering::Release);
        self.released.release();
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        self.released.release();
    }

    /// Bloquea hasta la próxima orden. `None` significa terminar.
    pub(crate) fn wait(&self) -> Option<u64> {
        self.released.acquire();
        if self.terminated.load(Ordering::Acquire) {
            return None;
        }
        Some(self.current_round.load(Ordering::Acquire))
    }
}

/// Referencia (no dueña) al sucesor en el anillo.
#[derive(Debug, Clone)]
pub struct RingLink {
    successor_uid: u32,
    inbox: Sender<Token>,
    events: Sender<NodeEvent>,
}

impl RingLink {
    pub fn new(successor_uid: u32, inbox: Sender<Token>, events: Sender<NodeEvent>) -> Self {
        RingLink {
            successor_uid,
            inbox,
            events,
        }
    }

    pub fn successor_uid(&self) -> u32 {
        self.successor_uid
    }

    /// Corre en el hilo del predecesor y nunca bloquea: si el token es el uid
    /// del sucesor dio la vuelta entera y se avisa al coordinador; si no, queda
    /// en la bandeja del sucesor hasta su próximo turno.
    pub fn deliver(&self, token: Token) -> Result<(), ElectionError> {
        let disconnected = ElectionError::Disconnected { round: token.round };
        if token.uid == self.successor_uid {
            info!(uid = token.uid, round = token.round, "líder confirmado");
            self.events
                .send(NodeEvent::LeaderConfirmed {
                    uid: token.uid,
                    round: token.round,
                })
                .map_err(|_| disconnected)
        } else {
            self.inbox.send(token).map_err(|_| disconnected)
        }
    }
}

pub struct RingNode {
    state: ElectionState,
    gate: Arc<NodeGate>,
    inbox: Receiver<Token>,
    pending: Vec<Token>,
    successor: RingLink,
    events: Sender<NodeEvent>,
    forwarded: u64,
}

impl RingNode {
    pub fn new(
        uid: u32,
        gate: Arc<NodeGate>,
        inbox: Receiver<Token>,
        successor: RingLink,
        events: Sender<NodeEvent>,
    ) -> Self {
        RingNode {
            state: ElectionState::new(uid),
            gate,
            inbox,
            pending: Vec::new(),
            successor,
            events,
            forwarded: 0,
        }
    }

    /// Cuerpo del hilo: esperar, actuar, reportar, hasta que el coordinador corte.
    pub fn run(mut self) -> Result<NodeReport, ElectionError> {
        let uid = self.state.uid();
        debug!(uid, successor = self.successor.successor_uid(), "nodo iniciado");

        while let Some(round) = self.gate.wait() {
            self.absorb_pending(round);

            let forwarded = self.state.may_forward(round);
            if forwarded {
                let token = Token {
                    uid: self.state.min_seen(),
                    round,
                };
                trace!(uid, round, candidate = token.uid, "reenviando token");
                self.successor.deliver(token)?;
                self.forwarded += 1;
            }

            self.events
                .send(NodeEvent::TurnCompleted {
                    uid,
                    round,
                    forwarded,
                })
                .map_err(|_| ElectionError::Disconnected { round })?;
        }

        // lo que llegó en la última ronda también cuenta para el reporte final
        self.absorb_pending(u64::MAX);
        debug!(uid, min_seen = self.state.min_seen(), "nodo detenido");
        Ok(NodeReport {
            uid,
            min_seen: self.state.min_seen(),
            min_seen_round: self.state.min_seen_round(),
            forwarded: self.forwarded,
        })
    }

    /// Aplica los tokens enviados en rondas anteriores a `round`; los de la
    /// ronda en curso esperan al turno siguiente.
    fn absorb_pending(&mut self, round: u64) {
        self.pending.extend(self.inbox.try_iter());
        let (ready, later): (Vec<Token>, Vec<Token>) = mem::take(&mut self.pending)
            .into_iter()
            .partition(|token| token.round < round);
        self.pending = later;

        for token in ready {
            if self.state.absorb(token) {
                trace!(
                    uid = self.state.uid(),
                    min_seen = token.uid,
                    since = token.round,
                    "bajó el mínimo"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn fresh_state_waits_two_to_the_uid_rounds() {
        let state = ElectionState::new(3);
        assert!(!state.may_forward(1));
        assert!(!state.may_forward(7));
        assert!(state.may_forward(8));
        assert!(!state.may_forward(9));
    }

    #[test]
    fn absorb_only_lowers_the_minimum() {
        let mut state = ElectionState::new(10);
        assert!(state.absorb(Token { uid: 4, round: 16 }));
        assert_eq!((state.min_seen(), state.min_seen_round()), (4, 16));

        assert!(!state.absorb(Token { uid: 7, round: 20 }));
        assert!(!state.absorb(Token { uid: 4, round: 32 }));
        assert_eq!((state.min_seen(), state.min_seen_round()), (4, 16));

        assert!(state.may_forward(32));
    }

    #[test]
    fn minimum_is_monotone_over_any_token_sequence() {
        let mut state = ElectionState::new(20);
        let tokens = [15, 18, 9, 12, 9, 3, 30, 5, 1, 2];
        let mut previous = state.min_seen();
        for (round, uid) in tokens.into_iter().enumerate() {
            state.absorb(Token {
                uid,
                round: round as u64,
            });
            assert!(state.min_seen() <= previous);
            previous = state.min_seen();
        }
        assert_eq!(state.min_seen(), 1);
        assert_eq!(state.min_seen_round(), 8);
    }

    #[test]
    fn huge_minimum_never_opens_the_gate() {
        let state = ElectionState::new(100);
        assert!(!state.may_forward(u64::MAX));
        assert!(!state.may_forward(0));
    }

    #[test]
    fn own_uid_coming_back_is_a_leader_signal() {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();
        let link = RingLink::new(5, inbox_tx, events_tx);

        link.deliver(Token { uid: 5, round: 96 }).unwrap();
        link.deliver(Token { uid: 2, round: 96 }).unwrap();

        assert_eq!(
            events_rx.try_recv(),
            Ok(NodeEvent::LeaderConfirmed { uid: 5, round: 96 })
        );
        assert_eq!(inbox_rx.try_recv(), Ok(Token { uid: 2, round: 96 }));
        assert!(inbox_rx.try_recv().is_err());
    }

    #[test]
    fn deliver_fails_once_the_coordinator_is_gone() {
        let (inbox_tx, _inbox_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();
        drop(events_rx);
        let link = RingLink::new(5, inbox_tx, events_tx);

        assert!(matches!(
            link.deliver(Token { uid: 5, round: 3 }),
            Err(ElectionError::Disconnected { round: 3 })
        ));
    }

    #[test]
    fn tokens_from_the_current_round_wait_for_the_next_turn() {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (events_tx, _events_rx) = mpsc::channel();
        let (succ_tx, _succ_rx) = mpsc::channel();
        let link = RingLink::new(9, succ_tx, events_tx.clone());
        let mut node = RingNode::new(6, Arc::new(NodeGate::default()), inbox_rx, link, events_tx);

        inbox_tx.send(Token { uid: 2, round: 4 }).unwrap();
        node.absorb_pending(4);
        assert_eq!(node.state.min_seen(), 6);

        node.absorb_pending(5);
        assert_eq!(node.state.min_seen(), 2);
        assert_eq!(node.state.min_seen_round(), 4);
    }

    #[test]
    fn single_node_ring_confirms_itself() {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        let (events_tx, events_rx) = mpsc::channel();
        let gate = Arc::new(NodeGate::default());
        let link = RingLink::new(1, inbox_tx, events_tx.clone());
        let node = RingNode::new(1, gate.clone(), inbox_rx, link, events_tx);
        let handle = thread::spawn(move || node.run());

        gate.release(1);
        assert_eq!(
            events_rx.recv().unwrap(),
            NodeEvent::TurnCompleted {
                uid: 1,
                round: 1,
                forwarded: false
            }
        );
        gate.release(2);
        assert_eq!(
            events_rx.recv().unwrap(),
            NodeEvent::LeaderConfirmed { uid: 1, round: 2 }
        );
        assert_eq!(
            events_rx.recv().unwrap(),
            NodeEvent::TurnCompleted {
                uid: 1,
                round: 2,
                forwarded: true
            }
        );
        gate.terminate();

        let report = handle.join().unwrap().unwrap();
        assert!(report.believes_leader());
        assert_eq!(report.forwarded, 1);
    }
}
