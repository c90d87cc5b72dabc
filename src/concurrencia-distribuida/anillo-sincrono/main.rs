/*
ELECCIÓN DE LÍDER EN ANILLO SÍNCRONO
- N nodos forman un anillo unidireccional, cada uno con un uid distinto.
- Un coordinador avanza las rondas: libera a todos, espera a que todos terminen y recién ahí abre la siguiente.
- En cada ronda un nodo puede reenviar a su sucesor el menor uid que conoce (si la compuerta de ronda lo permite).
- Gana el menor uid: su dueño lo reconoce cuando le vuelve después de dar toda la vuelta.
*/

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use eleccion_anillo::loader::{load_file, parse_list, random_uids};
use eleccion_anillo::{Coordinator, SimulationConfig, TerminationPolicy};
use rand::thread_rng;
use tracing::info;

const DEFAULT_INPUT: &str = "input.dat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    LeaderSignal,
    RoundBound,
}

#[derive(Parser, Debug)]
#[command(name = "anillo-sincrono")]
#[command(about = "Simula una elección de líder en anillo síncrono con un hilo por nodo")]
struct Args {
    /// Archivo con N seguido de N uids (por defecto `input.dat`)
    #[arg(short, long, conflicts_with_all = ["uids", "random"])]
    file: Option<PathBuf>,

    /// Uids en orden de anillo, separados por comas o espacios
    #[arg(short, long, allow_hyphen_values = true, conflicts_with = "random")]
    uids: Option<String>,

    /// Genera un anillo al azar de este tamaño
    #[arg(short, long)]
    random: Option<usize>,

    /// Uid máximo para los anillos al azar
    #[arg(long, default_value_t = 16)]
    max_uid: u32,

    #[arg(short, long, value_enum, default_value_t = PolicyArg::LeaderSignal)]
    policy: PolicyArg,

    /// Solo con round-bound: reemplaza N * 2^min(uids)
    #[arg(long)]
    max_rounds: Option<u64>,

    #[arg(long, default_value_t = 5)]
    round_timeout_secs: u64,

    /// Muestra el estado final de cada nodo
    #[arg(short, long)]
    dump: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let uids = if let Some(count) = args.random {
        random_uids(count, args.max_uid, &mut thread_rng())?
    } else if let Some(list) = &args.uids {
        parse_list(list)?
    } else {
        let path = args.file.unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
        info!(?path, "cargando anillo desde archivo");
        load_file(&path)?
    };
    info!(?uids, "anillo");

    let policy = match args.policy {
        PolicyArg::LeaderSignal => TerminationPolicy::LeaderSignal,
        PolicyArg::RoundBound => TerminationPolicy::RoundBound {
            max_rounds: args.max_rounds,
        },
    };
    let config = SimulationConfig::new(uids, policy)?
        .with_round_timeout(Duration::from_secs(args.round_timeout_secs));

    let outcome = Coordinator::new(config).run()?;
    outcome.log(args.dump);
    Ok(())
}
