//! Headless Wasteland Simulation
//!
//! Drives the claim engine with a handful of simulated wallets wandering the
//! catalog, one claim per wallet per cooldown window, and prints where
//! everyone ended up. Useful for eyeballing balance changes to
//! `data/engine.toml` without a client.
//!
//! ```bash
//! RUST_LOG=atomicfizz_engine=debug wasteland_sim --seed 7 --wallets 3 --rounds 48
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use atomicfizz_engine::{
    ChaChaSource, ClaimEngine, ClaimResult, EngineConfig, EngineResult, JournalRepository, LocationCatalog,
    MemoryRepository, MintablePool, PlayerRepository,
};
use atomicfizz_shared::StimpakTier;
use clap::Parser;
use serde::Serialize;

/// Headless Wasteland Simulation - many wallets, many claims
#[derive(Parser, Debug)]
#[command(name = "wasteland_sim")]
#[command(about = "Run simulated wallets through the claim engine and report the outcome")]
struct Args {
    /// Engine balance config (TOML)
    #[arg(long, default_value = "data/engine.toml")]
    config: PathBuf,

    /// Location catalog (JSON array)
    #[arg(long, default_value = "data/locations.json")]
    locations: PathBuf,

    /// Mintable batches, merged in order
    #[arg(long, num_args = 1.., default_values = ["data/mintables_batch1.json", "data/mintables_batch2.json"])]
    mintables: Vec<PathBuf>,

    /// Persist players to this journal instead of memory (compacted at the end)
    #[arg(long)]
    journal: Option<PathBuf>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated wallets
    #[arg(long, default_value_t = 5)]
    wallets: usize,

    /// Claim attempts per wallet
    #[arg(long, default_value_t = 24)]
    rounds: usize,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

/// Final standing of one wallet.
#[derive(Serialize)]
struct WalletSummary {
    wallet: String,
    level: u32,
    caps: u64,
    hp: u32,
    radiation: u64,
    items: usize,
    gear: usize,
    raids_won: u32,
    granted: usize,
    denied: usize,
}

/// Whole-run summary.
#[derive(Serialize)]
struct SimSummary {
    seed: Option<u64>,
    rounds: usize,
    wallets: Vec<WalletSummary>,
    mintables_claimed: usize,
    mintables_total: usize,
}

/// First timestamp of the simulated clock (epoch ms).
const SIM_EPOCH_MS: u64 = 1_700_000_000_000;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("atomicfizz_engine=info")),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Simulation aborted: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> EngineResult<()> {
    let mut config = EngineConfig::load(&args.config)?;
    config.apply_env_overrides()?;
    let cooldown_ms = config.claim.cooldown_ms.max(1);
    let common_price = config.stimpaks.spec(StimpakTier::Common).price;

    let catalog = LocationCatalog::load(&args.locations)?;
    let pool = MintablePool::load(&args.mintables)?;
    let journal = args.journal.as_ref().map(JournalRepository::open).transpose()?.map(Arc::new);
    let repository: Arc<dyn PlayerRepository> = match &journal {
        Some(journal) => Arc::clone(journal) as Arc<dyn PlayerRepository>,
        None => Arc::new(MemoryRepository),
    };

    let rng = args.seed.map_or_else(ChaChaSource::from_entropy, ChaChaSource::seeded);
    let engine = ClaimEngine::new(config, catalog, pool, repository)?.with_rng(rng);

    let locations = engine.get_locations().to_vec();
    let wallets: Vec<String> = (0..args.wallets).map(|i| format!("sim-wallet-{i:03}")).collect();
    let mut tallies = vec![(0usize, 0usize); wallets.len()];

    for wallet in &wallets {
        engine.claim_quest(wallet, "welcome-to-the-wasteland", 100)?;
    }

    for round in 0..args.rounds {
        let now_ms = SIM_EPOCH_MS + cooldown_ms * round as u64;
        for (i, wallet) in wallets.iter().enumerate() {
            let player = engine.get_player(wallet);
            if player.stimpaks.is_empty() && player.caps >= common_price {
                engine.buy_stimpak(wallet, StimpakTier::Common)?;
            }

            // Wander through every spot this wallet can reach, shifting each round.
            let reachable: Vec<_> = locations
                .iter()
                .filter(|l| l.required_level <= player.level)
                .collect();
            let Some(location) = reachable.get((i + round) % reachable.len().max(1)) else {
                continue;
            };

            match engine.claim_survival(wallet, &location.name, Some(location.coordinates()), now_ms)? {
                ClaimResult::Granted(_) => tallies[i].0 += 1,
                ClaimResult::Denied(_) => tallies[i].1 += 1,
            }
        }
    }

    if let Some(journal) = &journal {
        journal.compact()?;
    }

    let mintables = engine.mintables();
    let summary = SimSummary {
        seed: args.seed,
        rounds: args.rounds,
        wallets: wallets
            .iter()
            .zip(&tallies)
            .map(|(wallet, &(granted, denied))| {
                let p = engine.get_player(wallet);
                WalletSummary {
                    wallet: wallet.clone(),
                    level: p.level,
                    caps: p.caps,
                    hp: p.hp,
                    radiation: p.radiation,
                    items: p.inventory.len(),
                    gear: p.gear.len(),
                    raids_won: p.raids_won,
                    granted,
                    denied,
                }
            })
            .collect(),
        mintables_claimed: mintables.iter().filter(|m| m.is_claimed()).count(),
        mintables_total: mintables.len(),
    };

    if args.json {
        let out = serde_json::to_string_pretty(&summary)
            .map_err(|e| atomicfizz_engine::EngineError::Configuration(format!("failed to encode summary: {e}")))?;
        println!("{out}");
    } else {
        print_table(&summary);
    }
    Ok(())
}

fn print_table(summary: &SimSummary) {
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                 WASTELAND SIMULATION ({} rounds)", summary.rounds);
    println!("═══════════════════════════════════════════════════════════════════");
    println!(
        "  {:<16} {:>5} {:>7} {:>5} {:>5} {:>6} {:>5} {:>6} {:>8}",
        "wallet", "lvl", "caps", "hp", "rads", "items", "gear", "raids", "ok/deny"
    );
    for w in &summary.wallets {
        println!(
            "  {:<16} {:>5} {:>7} {:>5} {:>5} {:>6} {:>5} {:>6} {:>8}",
            w.wallet,
            w.level,
            w.caps,
            w.hp,
            w.radiation,
            w.items,
            w.gear,
            w.raids_won,
            format!("{}/{}", w.granted, w.denied)
        );
    }
    println!();
    println!(
        "  Mintables claimed: {}/{}",
        summary.mintables_claimed, summary.mintables_total
    );
}
