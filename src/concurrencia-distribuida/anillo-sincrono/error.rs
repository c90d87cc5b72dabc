use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Anillos que no pueden simularse: se detectan antes de lanzar cualquier hilo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("el anillo debe tener al menos un nodo")]
    EmptyRing,
    #[error("el uid `{uid}` en la posición {position} no es positivo")]
    NonPositiveUid { position: usize, uid: i64 },
    #[error("el uid `{uid}` en la posición {position} no entra en 32 bits")]
    UidOutOfRange { position: usize, uid: i64 },
    #[error("el uid `{uid}` aparece más de una vez en el anillo")]
    DuplicateUid { uid: u32 },
    #[error("la cota de rondas {ring_size} * 2^{min_uid} no entra en 64 bits")]
    RoundBoundOverflow { ring_size: usize, min_uid: u32 },
    #[error("max_rounds debe ser al menos 1")]
    ZeroRoundLimit,
}

#[derive(Error, Debug)]
pub enum ElectionError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("la ronda {round} no terminó a tiempo")]
    DeadlockTimeout { round: u64 },
    #[error("sin aviso de líder después de {rounds} rondas")]
    LeaderNeverConfirmed { rounds: u64 },
    #[error("canal de nodos cerrado durante la ronda {round}")]
    Disconnected { round: u64 },
    #[error("el nodo {uid} entró en pánico")]
    NodePanicked { uid: u32 },
    #[error("no se pudo lanzar el hilo del nodo {uid}: `{source}`")]
    Spawn {
        uid: u32,
        #[source]
        source: io::Error,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no se pudo leer `{path}`: `{source}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("`{token}` no es un entero")]
    Parse { token: String },
    #[error("la cabecera anuncia {expected} uids pero se encontraron {found}")]
    CountMismatch { expected: usize, found: usize },
    #[error("no se pueden sortear {requested} uids distintos de 1..={max_uid}")]
    TooFewCandidates { requested: usize, max_uid: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_read_in_spanish() {
        assert_eq!(
            ConfigurationError::DuplicateUid { uid: 3 }.to_string(),
            "el uid `3` aparece más de una vez en el anillo"
        );
        assert_eq!(
            ElectionError::from(ConfigurationError::EmptyRing).to_string(),
            "el anillo debe tener al menos un nodo"
        );
        assert_eq!(
            ElectionError::DeadlockTimeout { round: 7 }.to_string(),
            "la ronda 7 no terminó a tiempo"
        );
    }
}
