//! Elección de líder síncrona sobre un anillo unidireccional.
//!
//! Cada nodo corre en su propio hilo; el coordinador los libera ronda a ronda
//! y espera a que todos terminen antes de abrir la siguiente. Cada nodo solo
//! reenvía su mínimo en la ronda `min_seen_round + 2^min_seen`, y el nodo cuyo
//! uid da la vuelta completa queda confirmado como líder.

pub mod coordinator;
pub mod error;
pub mod loader;
pub mod report;
pub mod ring_node;
pub mod termination;

pub use coordinator::{run_election, Coordinator, SimulationConfig, DEFAULT_ROUND_TIMEOUT};
pub use error::{ConfigurationError, ElectionError, LoadError};
pub use report::ElectionOutcome;
pub use ring_node::NodeReport;
pub use termination::{default_round_bound, TerminationPolicy};
