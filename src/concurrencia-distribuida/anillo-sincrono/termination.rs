//! Políticas de terminación y la aritmética de rondas que comparten.

use std::fmt;

/// Cuándo deja el coordinador de emitir rondas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Se corta cuando el líder recibe su propio uid de vuelta.
    LeaderSignal,
    /// Se corta al superar `max_rounds` (por defecto `N * 2^min(uids)`).
    RoundBound { max_rounds: Option<u64> },
}

impl fmt::Display for TerminationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationPolicy::LeaderSignal => write!(f, "leader-signal"),
            TerminationPolicy::RoundBound { max_rounds: None } => write!(f, "round-bound"),
            TerminationPolicy::RoundBound {
                max_rounds: Some(max),
            } => write!(f, "round-bound({max})"),
        }
    }
}

/// Límite ya resuelto para una corrida concreta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundLimit {
    /// Pasado `guard` sin señal de líder la corrida es un error.
    AwaitLeader { guard: u64 },
    /// Se detiene al superar `max_rounds`.
    Cutoff { max_rounds: u64 },
}

impl RoundLimit {
    pub fn resolve(policy: TerminationPolicy, default_bound: u64) -> RoundLimit {
        match policy {
            TerminationPolicy::LeaderSignal => RoundLimit::AwaitLeader {
                guard: default_bound,
            },
            TerminationPolicy::RoundBound { max_rounds } => RoundLimit::Cutoff {
                max_rounds: max_rounds.unwrap_or(default_bound),
            },
        }
    }

    pub fn exceeded_by(&self, round: u64) -> bool {
        match *self {
            RoundLimit::AwaitLeader { guard } => round > guard,
            RoundLimit::Cutoff { max_rounds } => round > max_rounds,
        }
    }
}

/// `2^min_seen`; `None` si no entra en 64 bits, en cuyo caso el nodo nunca reenvía.
pub fn gate_period(min_seen: u32) -> Option<u64> {
    2u64.checked_pow(min_seen)
}

/// `ring_size * 2^min_uid`, suficiente para que el mínimo dé una vuelta completa.
pub fn default_round_bound(ring_size: usize, min_uid: u32) -> Option<u64> {
    let ring_size = u64::try_from(ring_size).ok()?;
    gate_period(min_uid)?.checked_mul(ring_size)
}
