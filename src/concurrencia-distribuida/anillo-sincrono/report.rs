use tracing::{info, warn};

use crate::ring_node::NodeReport;
use crate::termination::TerminationPolicy;

/// Resultado de una corrida.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionOutcome {
    pub leader_uid: u32,
    /// Ronda en que el token del líder volvió a él; `None` si el corte llegó antes.
    pub confirmed_round: Option<u64>,
    /// Rondas completas que se ejecutaron.
    pub rounds: u64,
    /// Tokens reenviados en total (complejidad de mensajes).
    pub messages: u64,
    pub policy: TerminationPolicy,
    /// En orden de anillo.
    pub nodes: Vec<NodeReport>,
}

impl ElectionOutcome {
    pub fn leader(&self) -> Option<&NodeReport> {
        self.nodes.iter().find(|node| node.uid == self.leader_uid)
    }

    pub fn log(&self, dump_nodes: bool) {
        match self.confirmed_round {
            Some(round) => info!(
                leader = self.leader_uid,
                confirmed_round = round,
                rounds = self.rounds,
                messages = self.messages,
                policy = %self.policy,
                "líder elegido"
            ),
            None => warn!(
                leader = self.leader_uid,
                rounds = self.rounds,
                messages = self.messages,
                policy = %self.policy,
                "líder elegido sin confirmación"
            ),
        }

        if dump_nodes {
            for node in &self.nodes {
                info!(
                    uid = node.uid,
                    min_seen = node.min_seen,
                    is_leader = node.uid == self.leader_uid,
                    forwarded = node.forwarded,
                    "nodo"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(uid: u32, min_seen: u32) -> NodeReport {
        NodeReport {
            uid,
            min_seen,
            min_seen_round: 0,
            forwarded: 1,
        }
    }

    #[test]
    fn finds_leader_report() {
        let outcome = ElectionOutcome {
            leader_uid: 2,
            confirmed_round: Some(12),
            rounds: 12,
            messages: 4,
            policy: TerminationPolicy::LeaderSignal,
            nodes: vec![node(4, 2), node(2, 2), node(3, 2)],
        };
        assert_eq!(outcome.leader(), Some(&node(2, 2)));
        outcome.log(true);
    }
}
