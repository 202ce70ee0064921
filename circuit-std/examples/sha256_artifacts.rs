//! Compiles the SHA-256 circuit over BN254, writes the input-solver and
//! layered-circuit artifacts, then reloads both and checks them on the
//! message `[1, 2, ..., n]` (bytes wrap at 256).
//!
//! ```bash
//! cargo run --release --example sha256_artifacts -- --message-len 100 --out-dir target/sha256
//! ```

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use ecc_circuit::{
    Bn254, CompileConfig, HintRegistry, InputSolver, LayeredCircuit, SolverConfig, compile,
};
use ecc_circuit_std::Sha256Circuit;
use p3_field::{PrimeCharacteristicRing, PrimeField};
use tracing::info;
use tracing_forest::ForestLayer;
use tracing_forest::util::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

#[derive(Parser, Debug)]
#[command(version, about = "SHA-256 circuit artifact generation")]
struct Args {
    /// Length of the hashed message in bytes.
    #[arg(short, long, default_value_t = 100)]
    message_len: usize,

    /// Directory receiving `solver.bin` and `circuit.bin`.
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Workers used by the constraint check.
    #[arg(short, long, default_value_t = 8)]
    workers: usize,
}

fn init_logger() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    Registry::default()
        .with(env_filter)
        .with(ForestLayer::default())
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    let args = Args::parse();

    let compiled = compile::<Bn254, _>(
        &Sha256Circuit::new(args.message_len),
        &CompileConfig::default(),
    )?;
    let stats = compiled.layered.stats();
    info!(
        "Compiled SHA-256 of {} bytes: {} layers, {} gates",
        args.message_len,
        stats.layers,
        stats.total_gates()
    );

    fs::create_dir_all(&args.out_dir)?;
    let solver_path = args.out_dir.join("solver.bin");
    let circuit_path = args.out_dir.join("circuit.bin");
    fs::write(&solver_path, compiled.solver.to_bytes()?)?;
    fs::write(&circuit_path, compiled.layered.to_bytes()?)?;
    info!("Wrote {} and {}", solver_path.display(), circuit_path.display());

    let solver =
        InputSolver::<Bn254>::from_bytes(&fs::read(&solver_path)?, HintRegistry::with_builtins())?;
    let layered = LayeredCircuit::<Bn254>::from_bytes(&fs::read(&circuit_path)?)?;

    let message: Vec<Bn254> = (1..=args.message_len)
        .map(|i| Bn254::from_u8(i as u8))
        .collect();
    let witness = solver.solve(&message, &SolverConfig::default().with_workers(args.workers))?;
    let outputs = layered.evaluate(witness.layered_inputs())?;
    if outputs != witness.outputs() {
        return Err("layered circuit disagrees with the input solver".into());
    }

    let digest: String = outputs
        .chunks_exact(4)
        .flat_map(|word| word.iter().rev())
        .map(|byte| format!("{:02x}", byte.as_canonical_biguint()))
        .collect();
    info!("Digest: {digest}");
    Ok(())
}
