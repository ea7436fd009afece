//! rig-cli — offline tooling for Rig deployments.
//!
//! Validates configuration files, prints emission schedules and replays
//! operation scripts against in-memory rigs, writing every emitted event
//! as one JSON line.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rig_core::auction::Bid;
use rig_core::bank::MemoryBank;
use rig_core::emission::halved_rate;
use rig_core::error::RigError;
use rig_core::events::RigEvent;
use rig_core::traits::{RandomnessProvider, TokenBank};
use rig_core::types::{Account, Amount, Asset, Timestamp};
use rig_engine::config::amount;
use rig_engine::entropy::LocalEntropy;
use rig_engine::{DayPoolRig, EnterRequest, OccupyRequest, PoolRig, RigConfig, SlotRig};

/// Rig command-line tools.
#[derive(Parser)]
#[command(name = "rig-cli")]
#[command(version, about = "Auction-priced emission rigs: config checks, schedules and replays")]
struct Cli {
    /// Config file (default: <config dir>/rig/rig.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log filter (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the configured log format ("text" or "json").
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the config, then print the resolved settings.
    Validate,
    /// Print the halving schedule of every rig.
    Schedule(ScheduleArgs),
    /// Run a JSON operation script against fresh in-memory rigs.
    Replay(ReplayArgs),
}

#[derive(Args)]
struct ScheduleArgs {
    /// Number of halvings to list per curve.
    #[arg(short, long, default_value_t = 8)]
    steps: u32,
}

#[derive(Args)]
struct ReplayArgs {
    /// Path to the operation script.
    script: PathBuf,

    /// Seed for the local randomness provider.
    #[arg(long, default_value = "rig-replay")]
    seed: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config)?;
    let config = RigConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    let level = cli.log_level.unwrap_or_else(|| config.logging.level.clone());
    let format = cli.log_format.unwrap_or_else(|| config.logging.format.clone());
    init_logging(&level, &format);
    info!(path = %config_path.display(), "config loaded");

    match cli.command {
        Commands::Validate => validate(&config),
        Commands::Schedule(args) => schedule(&config, args.steps),
        Commands::Replay(args) => replay(&config, &args),
    }
}

fn resolve_config_path(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(p) = path {
        return Ok(p);
    }
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("rig").join("rig.toml"))
}

/// Initialize tracing with the given filter and output format.
///
/// `RUST_LOG` takes precedence over `level` when set.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout carries only command output.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// ---------------------------------------------------------------------------
// validate / schedule
// ---------------------------------------------------------------------------

fn validate(config: &RigConfig) -> Result<()> {
    config.validate()?;
    println!("{}", serde_json::to_string_pretty(config)?);
    println!("config ok");
    Ok(())
}

#[derive(Debug, PartialEq, Eq, Serialize)]
struct ScheduleRow {
    halving: u32,
    /// Cumulative supply (slot rig) or seconds since start (pool rigs).
    #[serde(with = "amount")]
    at: Amount,
    #[serde(with = "amount")]
    rate: Amount,
}

fn supply_schedule(config: &RigConfig, steps: u32) -> Vec<ScheduleRow> {
    let curve = config.slot.emission.curve();
    let mut rows = vec![ScheduleRow { halving: 0, at: 0, rate: curve.initial_rate }];
    for n in 1..=steps {
        let Some(threshold) = curve.threshold(n) else {
            break;
        };
        let rate = halved_rate(curve.initial_rate, curve.tail_rate, n);
        rows.push(ScheduleRow { halving: n, at: threshold, rate });
        if rate == curve.tail_rate {
            break;
        }
    }
    rows
}

fn time_schedule(curve: &rig_core::emission::TimeHalving, steps: u32) -> Vec<ScheduleRow> {
    let mut rows = Vec::new();
    for n in 0..=steps {
        let Some(at) = u64::from(n).checked_mul(curve.halving_period) else {
            break;
        };
        let rate = curve.rate(0, at);
        rows.push(ScheduleRow { halving: n, at: Amount::from(at), rate });
        if rate == curve.tail_rate {
            break;
        }
    }
    rows
}

fn schedule(config: &RigConfig, steps: u32) -> Result<()> {
    let report = serde_json::json!({
        "slot": supply_schedule(config, steps),
        "pool": time_schedule(&config.pool.emission.curve(), steps),
        "day_pool": time_schedule(&config.day_pool.emission.curve(), steps),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

/// An operation script. Accounts are hex (`0x…`) or labels.
#[derive(Debug, Deserialize)]
struct Script {
    /// Quote balance granted to each account before the first operation.
    #[serde(default)]
    funds: BTreeMap<String, Funds>,
    /// Fee charged by the local randomness provider.
    #[serde(default, with = "amount")]
    entropy_fee: Amount,
    ops: Vec<Op>,
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct Funds(#[serde(with = "amount")] Amount);

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op {
    Occupy {
        at: Timestamp,
        who: String,
        #[serde(default)]
        slot: u32,
        /// Expected epoch; the live epoch when omitted.
        epoch: Option<u64>,
        #[serde(default)]
        note: String,
    },
    Enter {
        at: Timestamp,
        who: String,
        epoch: Option<u64>,
    },
    Contribute {
        at: Timestamp,
        who: String,
        #[serde(with = "amount")]
        amount: Amount,
    },
    Claim {
        at: Timestamp,
        who: String,
        day: u64,
    },
    ClaimBatch {
        at: Timestamp,
        who: String,
        days: Vec<u64>,
    },
    Withdraw {
        who: String,
    },
    WithdrawPayout {
        who: String,
    },
    /// Deliver every outstanding randomness request.
    Fulfil {
        at: Timestamp,
    },
    /// Drop every outstanding randomness request undelivered.
    Discard,
    /// Grow the slot rig; issued by the configured owner.
    IncreaseCapacity {
        at: Timestamp,
        capacity: u32,
    },
}

fn parse_account(s: &str) -> Result<Account> {
    if s.starts_with("0x") {
        return s.parse().map_err(|e| anyhow::anyhow!("Invalid account {s:?}: {e}"));
    }
    if s.is_empty() {
        bail!("Empty account label");
    }
    Ok(Account::from_label(s))
}

/// The three rigs, each settling against its own in-memory bank.
struct Replay {
    owner: Account,
    slot: SlotRig<MemoryBank, LocalEntropy>,
    pool: PoolRig<MemoryBank, LocalEntropy>,
    day_pool: DayPoolRig<MemoryBank>,
    pool_randomness: bool,
}

#[derive(Debug, Default, Serialize)]
struct ReplaySummary {
    applied: usize,
    failed: usize,
    events: usize,
    #[serde(with = "amount")]
    slot_minted: Amount,
    #[serde(with = "amount")]
    slot_claimable: Amount,
    #[serde(with = "amount")]
    pool_minted: Amount,
    #[serde(with = "amount")]
    pool_balance: Amount,
    #[serde(with = "amount")]
    day_pool_minted: Amount,
}

impl Replay {
    fn new(config: &RigConfig, script: &Script, seed: &str) -> Result<Self> {
        let mut bank = MemoryBank::new(Account::from_label("custody"));
        for (who, Funds(amount)) in &script.funds {
            bank.fund(Asset::Quote, parse_account(who)?, *amount);
        }
        let entropy = |name: &str| {
            let seed = format!("{seed}/{name}");
            LocalEntropy::new(seed.as_bytes(), Account::from_label("entropy"), script.entropy_fee)
        };
        Ok(Self {
            owner: config.roles.owner,
            slot: SlotRig::new(&config.slot, config.roles.clone(), bank.clone(), entropy("slot"), 0)?,
            pool: PoolRig::new(&config.pool, config.roles.clone(), bank.clone(), entropy("pool"), 0)?,
            day_pool: DayPoolRig::new(&config.day_pool, config.roles.clone(), bank, 0)?,
            pool_randomness: config.pool.randomness.enabled,
        })
    }

    fn apply(&mut self, op: &Op) -> Result<()> {
        match op {
            Op::Occupy { at, who, slot, epoch, note } => {
                let live = self
                    .slot
                    .slot(*slot)
                    .map(|s| s.clock.epoch_id)
                    .unwrap_or_default();
                let entropy_fee = if self.slot.randomness_enabled() {
                    self.slot.provider().fee()
                } else {
                    0
                };
                let request = OccupyRequest {
                    occupant: parse_account(who)?,
                    slot: *slot,
                    bid: open_bid(epoch.unwrap_or(live), *at),
                    note: note.clone(),
                    entropy_fee,
                };
                self.slot.occupy(request, *at)?;
            }
            Op::Enter { at, who, epoch } => {
                let entropy_fee = if self.pool_randomness {
                    self.pool.provider_mut().fee()
                } else {
                    0
                };
                let request = EnterRequest {
                    participant: parse_account(who)?,
                    bid: open_bid(epoch.unwrap_or(self.pool.epoch()), *at),
                    entropy_fee,
                };
                self.pool.enter(request, *at)?;
            }
            Op::Contribute { at, who, amount } => {
                self.day_pool.contribute(parse_account(who)?, *amount, *at)?;
            }
            Op::Claim { at, who, day } => {
                self.day_pool.claim(parse_account(who)?, *day, *at)?;
            }
            Op::ClaimBatch { at, who, days } => {
                self.day_pool.claim_batch(parse_account(who)?, days, *at)?;
            }
            Op::Withdraw { who } => {
                self.slot.withdraw(parse_account(who)?)?;
            }
            Op::WithdrawPayout { who } => {
                self.pool.withdraw_payout(parse_account(who)?)?;
            }
            Op::Fulfil { at } => {
                for (sequence, entropy) in self.slot.provider_mut().fulfil_all() {
                    self.slot.resolve(sequence, entropy, *at);
                }
                for (sequence, entropy) in self.pool.provider_mut().fulfil_all() {
                    self.pool.resolve(sequence, entropy);
                }
            }
            Op::Discard => {
                let dropped = self.slot.provider_mut().discard_all() + self.pool.provider_mut().discard_all();
                debug!(dropped, "replay: randomness requests discarded");
            }
            Op::IncreaseCapacity { at, capacity } => {
                self.slot.increase_capacity(self.owner, *capacity, *at)?;
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) -> Vec<(&'static str, RigEvent)> {
        let slot = self.slot.drain_events().into_iter().map(|e| ("slot", e));
        let pool = self.pool.drain_events().into_iter().map(|e| ("pool", e));
        let day = self.day_pool.drain_events().into_iter().map(|e| ("day_pool", e));
        slot.chain(pool).chain(day).collect()
    }
}

fn open_bid(expected_epoch: u64, now: Timestamp) -> Bid {
    Bid {
        expected_epoch,
        deadline: now,
        max_price: Amount::MAX,
    }
}

#[derive(Serialize)]
struct EventLine<'a> {
    op: usize,
    rig: &'static str,
    #[serde(flatten)]
    event: &'a RigEvent,
}

fn load_script(path: &Path) -> Result<Script> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid script {}", path.display()))
}

fn run_script(config: &RigConfig, script: &Script, seed: &str, out: &mut Vec<String>) -> Result<ReplaySummary> {
    let mut replay = Replay::new(config, script, seed)?;
    let mut summary = ReplaySummary::default();
    for (index, op) in script.ops.iter().enumerate() {
        match replay.apply(op) {
            Ok(()) => summary.applied += 1,
            Err(e) => {
                summary.failed += 1;
                let rejected = e.downcast_ref::<RigError>().is_some_and(RigError::is_validation);
                warn!(op = index, rejected, error = %e, "replay: operation failed");
                out.push(serde_json::json!({ "op": index, "error": e.to_string() }).to_string());
            }
        }
        for (rig, event) in replay.drain_events() {
            summary.events += 1;
            out.push(serde_json::to_string(&EventLine { op: index, rig, event: &event })?);
        }
    }
    summary.slot_minted = replay.slot.total_minted();
    summary.slot_claimable = replay.slot.total_claimable();
    summary.pool_minted = replay.pool.total_minted();
    summary.pool_balance = replay.pool.pool_balance();
    summary.day_pool_minted = replay.day_pool.total_minted();
    debug_assert_eq!(replay.slot.bank().supply(Asset::Unit), summary.slot_minted);
    let custody = replay.slot.bank().custody();
    info!(
        ops = script.ops.len(),
        failed = summary.failed,
        slot_custody = replay.slot.bank().balance(Asset::Quote, &custody),
        "replay: finished"
    );
    Ok(summary)
}

fn replay(config: &RigConfig, args: &ReplayArgs) -> Result<()> {
    let script = load_script(&args.script)?;
    let mut lines = Vec::new();
    let summary = run_script(config, &script, &args.seed, &mut lines)?;
    for line in lines {
        println!("{line}");
    }
    println!("{}", serde_json::to_string(&serde_json::json!({ "summary": summary }))?);
    Ok(())
}
