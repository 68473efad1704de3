//! ledger-runner: headless driver for the cash-transfer ledger.
//!
//! Usage:
//!   ledger-runner --seed 42 --citizens 40 --db ledger.db
//!   ledger-runner --db ledger.db --ipc-mode      (JSON lines on stdin/stdout)

use aidledger_core::{
    allocation_ledger::AllocationRequest,
    budget::NewBudget,
    command::LedgerCommand,
    config::LedgerConfig,
    disbursement::CompletionRequest,
    engine::LedgerEngine,
    error::{ErrorKind, LedgerError},
    money::format_2dp,
    population,
    types::Money,
};
use anyhow::Result;
use chrono::Datelike;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(serde::Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

/// Demo split: (group, percentage, max recipients).
const DEMO_SPLIT: &[(i64, i64, i64)] = &[(1, 40, 10), (2, 30, 10), (3, 20, 10), (4, 10, 10)];

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let citizens = parse_arg(&args, "--citizens", 40usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = arg_str(&args, "--db").unwrap_or(":memory:");
    let data_dir = arg_str(&args, "--data-dir").unwrap_or("./data");

    let config = if Path::new(data_dir).join("ledger.json").exists() {
        LedgerConfig::load(data_dir)?
    } else {
        log::warn!("runner: no ledger.json in {data_dir}, using built-in defaults");
        LedgerConfig::default_test()
    };

    if !ipc_mode {
        println!("Cash-transfer ledger: ledger-runner");
        println!("  seed:      {seed}");
        println!("  citizens:  {citizens}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    // Named shared-cache memory DB so a second connection can see the same data.
    let db_effective = if db == ":memory:" {
        format!("file:ledger_{}?mode=memory&cache=shared", unix_secs())
    } else {
        db.to_string()
    };
    let engine = LedgerEngine::open(&db_effective, config)?;

    if ipc_mode {
        run_ipc_loop(&engine)?;
    } else {
        run_demo(&engine, seed, citizens)?;
        print_summary(&engine)?;
    }
    Ok(())
}

fn run_ipc_loop(engine: &LedgerEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<LedgerCommand>(&buffer) {
            Ok(LedgerCommand::Quit) => break,
            Ok(cmd) => match engine.execute(&cmd) {
                Ok(value) => serde_json::json!({ "ok": value }),
                Err(e) => error_response(cmd.name(), &e),
            },
            Err(e) => serde_json::json!({
                "error": ErrorBody { kind: ErrorKind::Validation, message: e.to_string() }
            }),
        };
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn error_response(cmd: &str, e: &LedgerError) -> serde_json::Value {
    if e.kind() == ErrorKind::Internal {
        log::error!("runner: '{cmd}' failed internally: {e}");
    } else {
        log::info!("runner: '{cmd}' rejected: {e}");
    }
    serde_json::json!({
        "error": ErrorBody { kind: e.kind(), message: e.public_message() }
    })
}

/// One budget, four allocations, a seeded population, then one FIFO
/// disbursement per group.
fn run_demo(engine: &LedgerEngine, seed: u64, citizens: usize) -> Result<()> {
    let year = engine.clock().today().year();
    let budget = engine.create_budget(&NewBudget {
        year,
        project_name: format!("Cash transfer {year}"),
        total_budget: Money::from(1_000_000),
    })?;

    for &(group, pct, max) in DEMO_SPLIT {
        engine.add_allocation(&AllocationRequest {
            budget_id: budget.id,
            target_group_id: group,
            allocation_percentage: Money::from(pct),
            max_recipients: max,
        })?;
    }

    population::generate_citizens(engine, seed, citizens)?;

    for &(group, _, _) in DEMO_SPLIT {
        let Some(payment) = engine.next_pending(group)? else {
            continue;
        };
        let req = CompletionRequest {
            payment_id: payment.id,
            citizen_id: payment.citizen_id,
            target_group_id: group,
            budget_id: budget.id,
        };
        match engine.complete_payment(&req) {
            Ok(d) => println!(
                "  paid #{:<4} group {group}: {}",
                d.payment.queue_order,
                format_2dp(d.deducted_amount)
            ),
            Err(e) => println!("  group {group}: {}", e.public_message()),
        }
    }
    println!();
    Ok(())
}

fn print_summary(engine: &LedgerEngine) -> Result<()> {
    let report = engine.report(None)?;
    let citizens = engine.list_citizens()?.len();
    let events = engine.events_since(0)?.len();

    println!("=== LEDGER SUMMARY ===");
    println!("  total budget:     {}", format_2dp(report.total_budget));
    println!("  remaining budget: {}", format_2dp(report.total_remaining_budget));
    println!("  citizens:         {citizens}");
    println!("  events logged:    {events}");
    println!();
    println!("=== GROUPS ===");
    for g in &report.groups {
        println!(
            "  {:<12} | alloc left: {:>12} | paid: {:>10} | received: {:>3} | pending: {:>3} | citizens: {:>3}",
            g.group_name,
            format_2dp(g.remaining_budget),
            format_2dp(g.total_paid),
            g.received_count,
            g.pending_count,
            g.total_citizens
        );
    }
    Ok(())
}

fn arg_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
