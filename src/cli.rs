//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use tracing::{info, warn};

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_ledger::MemoryLedger;
use crate::adapters::oracle::build_oracle;
use crate::domain::config_validation::{
    build_engine_config, build_scheduler_config, deposit_amount,
};
use crate::domain::engine::{
    DEFAULT_DEPOSIT, DEFAULT_RECENT_LIMIT, ExecutionResult, PortfolioEngine, Snapshot,
};
use crate::domain::error::PaperledgerError;
use crate::domain::executor::Persistence;
use crate::domain::preferences::PreferencesUpdate;
use crate::domain::scheduler::Scheduler;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerPort;
use crate::ports::oracle_port::DecisionOracle;

/// Exit code when live state and a fresh replay disagree.
const EXIT_REPLAY_MISMATCH: u8 = 5;

#[derive(Parser, Debug)]
#[command(name = "paperledger", about = "Paper-trading portfolio ledger")]
pub struct Cli {
    /// INI configuration file; without one the ledger is memory-only
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the periodic scheduler with a manual trigger on stdin
    Serve,
    /// Run one decision cycle
    Cycle,
    /// Show cash, positions and performance
    Status,
    /// Print the valuation history
    History,
    /// Print the most recent transactions
    Transactions {
        #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
    /// Credit cash with a DEPOSIT transaction
    Deposit {
        #[arg(short, long)]
        amount: Option<f64>,
    },
    /// Wipe the ledger back to the genesis deposit
    Reset,
    /// Verify live state against a fresh replay of the ledger
    Replay,
}

pub fn run(cli: Cli) -> ExitCode {
    let config = match open_config(cli.config.as_ref()) {
        Ok(c) => c,
        Err(code) => return code,
    };

    match cli.command {
        Command::Serve => run_serve(&config),
        Command::Cycle => run_cycle(&config),
        Command::Status => with_engine(&config, |engine| {
            print_snapshot(&engine.snapshot());
            ExitCode::SUCCESS
        }),
        Command::History => with_engine(&config, run_history),
        Command::Transactions { limit } => {
            with_engine(&config, |engine| run_transactions(engine, limit))
        }
        Command::Deposit { amount } => run_deposit(&config, amount),
        Command::Reset => with_engine(&config, |engine| {
            let persistence = engine.reset();
            print_snapshot(&engine.snapshot());
            exit_for(&persistence)
        }),
        Command::Replay => with_engine(&config, run_replay),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PaperledgerError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn open_config(path: Option<&PathBuf>) -> Result<FileConfigAdapter, ExitCode> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            load_config(p)
        }
        None => FileConfigAdapter::from_string("").map_err(|reason| {
            let err = PaperledgerError::ConfigParse {
                file: "<empty>".to_string(),
                reason,
            };
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }),
    }
}

/// Open the configured ledger, falling back to a volatile one when the
/// durable store cannot be reached.
pub fn open_ledger(config: &dyn ConfigPort) -> Arc<dyn LedgerPort> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        if config.get_string("sqlite", "path").is_some() {
            let opened = SqliteAdapter::from_config(config)
                .and_then(|adapter| adapter.initialize_schema().map(|()| adapter));
            match opened {
                Ok(adapter) => return Arc::new(adapter),
                Err(e) => warn!(error = %e, "sqlite ledger unavailable; running memory-only"),
            }
        } else {
            info!("no [sqlite] path configured; running memory-only");
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = config;
        info!("built without sqlite; running memory-only");
    }

    Arc::new(MemoryLedger::new())
}

pub fn build_engine(config: &dyn ConfigPort) -> Result<PortfolioEngine, ExitCode> {
    let engine_config = build_engine_config(config).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    Ok(PortfolioEngine::open(open_ledger(config), engine_config))
}

fn with_engine<F>(config: &dyn ConfigPort, f: F) -> ExitCode
where
    F: FnOnce(&PortfolioEngine) -> ExitCode,
{
    match build_engine(config) {
        Ok(engine) => f(&engine),
        Err(code) => code,
    }
}

fn exit_for(persistence: &Persistence) -> ExitCode {
    match persistence {
        Persistence::Durable => ExitCode::SUCCESS,
        Persistence::Degraded { reason } => {
            let err = PaperledgerError::StorageDegraded {
                reason: reason.clone(),
            };
            eprintln!("warning: {err}");
            ExitCode::from(&err)
        }
    }
}

fn run_cycle(config: &dyn ConfigPort) -> ExitCode {
    let oracle = match build_oracle(config) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    with_engine(config, |engine| {
        let result = engine.run_cycle(&oracle);
        print_execution(&result);
        exit_for(&result.persistence)
    })
}

fn run_history(engine: &PortfolioEngine) -> ExitCode {
    match engine.history() {
        Ok(points) => {
            for p in &points {
                println!("{}\t{:.2}", p.timestamp.to_rfc3339(), p.total_value);
            }
            eprintln!("{} valuation points", points.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_transactions(engine: &PortfolioEngine, limit: usize) -> ExitCode {
    match engine.recent_transactions(limit) {
        Ok(rows) => {
            for tx in &rows {
                let price = tx.price.map_or_else(|| "-".to_string(), |p| format!("{p:.4}"));
                println!(
                    "{}\t{}\t{}\t{:.2}\t{}\t{:+.2}%\t{}",
                    tx.timestamp.to_rfc3339(),
                    tx.category,
                    tx.asset,
                    tx.amount,
                    price,
                    tx.gain,
                    tx.detail
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_deposit(config: &dyn ConfigPort, amount: Option<f64>) -> ExitCode {
    let amount = match amount {
        Some(a) if a > 0.0 && a.is_finite() => a,
        Some(a) => {
            let err = PaperledgerError::ConfigInvalid {
                section: "deposit".to_string(),
                key: "amount".to_string(),
                reason: format!("{a} is not a positive amount"),
            };
            eprintln!("error: {err}");
            return (&err).into();
        }
        None => match deposit_amount(config) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        },
    };
    with_engine(config, |engine| match engine.deposit(amount) {
        Ok(result) => {
            println!("Deposited ${amount:.2}; cash is now ${:.2}", result.cash);
            exit_for(&result.persistence)
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    })
}

fn run_replay(engine: &PortfolioEngine) -> ExitCode {
    match engine.verify_replay() {
        Ok(check) if check.is_consistent() => {
            println!(
                "Replay consistent: cash ${:.2}, {} positions",
                check.replayed.cash,
                check.replayed.positions.len()
            );
            ExitCode::SUCCESS
        }
        Ok(check) => {
            eprintln!(
                "error: replay mismatch: live cash ${:.2} vs replayed ${:.2}",
                check.live.cash, check.replayed.cash
            );
            ExitCode::from(EXIT_REPLAY_MISMATCH)
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_serve(config: &dyn ConfigPort) -> ExitCode {
    let scheduler_config = match build_scheduler_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let oracle: Arc<dyn DecisionOracle> = match build_oracle(config) {
        Ok(o) => Arc::new(o),
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let engine = match build_engine(config) {
        Ok(e) => Arc::new(e),
        Err(code) => return code,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let ticker = {
        let engine = Arc::clone(&engine);
        let oracle = Arc::clone(&oracle);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut scheduler = Scheduler::new(scheduler_config, Instant::now());
            scheduler.run(&stop, || {
                let result = engine.run_cycle(oracle.as_ref());
                print_execution(&result);
            });
        })
    };

    eprintln!("Scheduler running. Commands: run, status, deposit [amount], prefs key=bool, reset, quit");
    let default_deposit = deposit_amount(config).unwrap_or(DEFAULT_DEPOSIT);
    let quit = serve_commands(io::stdin().lock(), &engine, oracle.as_ref(), default_deposit);

    // Without a terminal (nohup, a service manager, `< /dev/null`) stdin ends
    // at once; the scheduler then runs until the process is killed.
    if quit {
        stop.store(true, Ordering::Relaxed);
    } else {
        info!("stdin closed; scheduler keeps running");
    }
    if ticker.join().is_err() {
        eprintln!("error: scheduler thread panicked");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Handle interactive serve commands until `quit`, end of input, or a read
/// error. Returns true only when `quit` (or `exit`) was entered.
pub fn serve_commands<R: BufRead>(
    input: R,
    engine: &PortfolioEngine,
    oracle: &dyn DecisionOracle,
    default_deposit: f64,
) -> bool {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "stdin unreadable");
                return false;
            }
        };
        let mut words = line.split_whitespace();
        match words.next() {
            Some("run") | Some("cycle") => print_execution(&engine.run_cycle(oracle)),
            Some("status") => print_snapshot(&engine.snapshot()),
            Some("deposit") => {
                let amount = words
                    .next()
                    .and_then(|w| w.parse::<f64>().ok())
                    .filter(|a| *a > 0.0 && a.is_finite())
                    .unwrap_or(default_deposit);
                match engine.deposit(amount) {
                    Ok(result) => {
                        println!("Deposited ${amount:.2}; cash is now ${:.2}", result.cash)
                    }
                    Err(e) => eprintln!("error: {e}"),
                }
            }
            Some("prefs") => match parse_prefs(words) {
                Ok(update) => println!("{:?}", engine.update_preferences(update)),
                Err(msg) => eprintln!("error: {msg}"),
            },
            Some("reset") => {
                let _ = exit_for(&engine.reset());
                print_snapshot(&engine.snapshot());
            }
            Some("quit") | Some("exit") => return true,
            Some(other) => eprintln!("unknown command '{other}'"),
            None => {}
        }
    }
    false
}

/// Parse `stocks=false crypto=true` style toggles.
pub fn parse_prefs<'a>(words: impl Iterator<Item = &'a str>) -> Result<PreferencesUpdate, String> {
    let mut update = PreferencesUpdate::default();
    for word in words {
        let (key, value) = word
            .split_once('=')
            .ok_or_else(|| format!("expected key=bool, got '{word}'"))?;
        let value: bool = value
            .parse()
            .map_err(|_| format!("'{value}' is not true or false"))?;
        match key {
            "stocks" => update.stocks = Some(value),
            "crypto" => update.crypto = Some(value),
            "polymarket" => update.polymarket = Some(value),
            other => return Err(format!("unknown preference '{other}'")),
        }
    }
    Ok(update)
}

fn print_execution(result: &ExecutionResult) {
    for rewrite in &result.rewrites {
        eprintln!("  guardrail: {rewrite:?}");
    }
    match &result.rejection {
        Some(rejection) => println!("REJECTED {} {}: {rejection}", result.action, result.asset),
        None => println!(
            "{} {} ${:.2}; portfolio value ${:.2}",
            result.action, result.asset, result.amount, result.total_value
        ),
    }
    if let Persistence::Degraded { reason } = &result.persistence {
        eprintln!("warning: ledger write degraded: {reason}");
    }
}

fn print_snapshot(snapshot: &Snapshot) {
    println!("Cash:        ${:.2}", snapshot.cash);
    println!("Holdings:    ${:.2}", snapshot.holdings);
    println!("Total value: ${:.2}", snapshot.total_value);
    println!(
        "Deposited:   ${:.2} ({:+.2}%)",
        snapshot.total_deposited, snapshot.performance_pct
    );
    for ((asset, position), value) in snapshot
        .positions
        .iter()
        .zip(snapshot.holdings_by_asset.values())
    {
        println!(
            "  {asset:<28} {:>14.6} sh @ {:>10.4}  ${value:>10.2}",
            position.shares, position.avg_price
        );
    }
}
