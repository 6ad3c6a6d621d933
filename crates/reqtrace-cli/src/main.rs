use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use reqtrace_analysis::breakdown::{analyze, BreakdownReport};
use reqtrace_analysis::workload::{count_transfers, method_histogram, WorkloadStats};
use reqtrace_data::transactions::load_transactions;
use reqtrace_data::{EventKind, EventStore};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "reqtrace")]
#[command(about = "Offline analysis of request lifecycle traces and transaction workloads")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Break request latency into per-phase durations from trace databases.
    Breakdown(BreakdownArgs),
    /// Count plain transfers in Etherscan transaction exports.
    Transfers(TransfersArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug)]
struct BreakdownArgs {
    /// Trace databases to analyze; each is reported separately.
    #[arg(long, default_value = "eventDB.sqlite")]
    db: Vec<PathBuf>,

    /// Output format: table (default), json, or csv.
    #[arg(long, default_value = "table")]
    output: String,

    /// Also list every per-request profile, not just the means.
    #[arg(long)]
    per_request: bool,
}

#[derive(Args, Debug)]
struct TransfersArgs {
    #[arg(long)]
    csv: Vec<PathBuf>,

    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct StatusArgs {
    #[arg(long, default_value = "eventDB.sqlite")]
    db: Vec<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Breakdown(args) => handle_breakdown(args),
        Commands::Transfers(args) => handle_transfers(args),
        Commands::Status(args) => handle_status(args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn handle_breakdown(args: BreakdownArgs) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let mut reports = Vec::with_capacity(args.db.len());
    for path in &args.db {
        pb.set_message(format!("analyzing {}", path.display()));
        let store = EventStore::open(path)?;
        let report = analyze(&store)
            .wrap_err_with(|| format!("failed to analyze trace database {}", path.display()))?;
        reports.push((path.clone(), report));
    }
    pb.finish_and_clear();

    match args.output.to_lowercase().as_str() {
        "table" => print_breakdown_table(&reports, args.per_request)?,
        "json" => print_breakdown_json(&reports)?,
        "csv" => print_breakdown_csv(&reports)?,
        _ => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table', 'json', or 'csv'",
                args.output
            ))
        }
    }

    info!(
        databases = reports.len(),
        output = %args.output,
        "breakdown command completed"
    );

    Ok(())
}

fn print_breakdown_table(reports: &[(PathBuf, BreakdownReport)], per_request: bool) -> Result<()> {
    for (path, report) in reports {
        println!("\n{}", path.display());

        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Phase", "Mean Duration"]);
        for kind in EventKind::ALL {
            table.add_row(vec![
                kind.to_string(),
                format!("{:.3}", report.summary.mean_phase(kind)),
            ]);
        }
        println!("{}\n", table);

        if per_request {
            let mut detail = Table::new();
            detail.load_preset(UTF8_BORDERS_ONLY);
            let mut header = vec!["Node".to_string(), "ClSn".to_string()];
            header.extend(EventKind::ALL.iter().map(|kind| kind.to_string()));
            header.push("Clamped".to_string());
            detail.set_header(header);

            for profile in &report.profiles {
                let mut row = vec![
                    profile.request.node_id.to_string(),
                    profile.request.client_sn.to_string(),
                ];
                row.extend(
                    EventKind::ALL
                        .iter()
                        .map(|kind| format!("{:.3}", profile.phase(*kind))),
                );
                row.push(if profile.clamped { "yes" } else { "" }.to_string());
                detail.add_row(row);
            }
            println!("{}\n", detail);
        }

        println!("Summary:");
        println!("  Events Loaded:      {}", report.total_events);
        println!("  Distinct Requests:  {}", report.distinct_requests);
        println!("  Complete Requests:  {}", report.profiles.len());
        println!("  Clamped Requests:   {}\n", report.clamped_requests());
    }

    Ok(())
}

fn print_breakdown_json(reports: &[(PathBuf, BreakdownReport)]) -> Result<()> {
    use serde::Serialize;

    #[derive(Serialize)]
    struct JsonPhase {
        event: &'static str,
        mean_duration: f64,
    }

    #[derive(Serialize)]
    struct JsonProfile {
        node_id: i64,
        client_sn: i64,
        clamped: bool,
        phases: Vec<JsonPhase>,
    }

    #[derive(Serialize)]
    struct JsonDatabase {
        db_path: String,
        events: usize,
        distinct_requests: usize,
        complete_requests: usize,
        clamped_requests: usize,
        phases: Vec<JsonPhase>,
        requests: Vec<JsonProfile>,
    }

    #[derive(Serialize)]
    struct JsonOutput {
        generated_at: String,
        databases: Vec<JsonDatabase>,
    }

    let databases: Vec<JsonDatabase> = reports
        .iter()
        .map(|(path, report)| JsonDatabase {
            db_path: path.display().to_string(),
            events: report.total_events,
            distinct_requests: report.distinct_requests,
            complete_requests: report.profiles.len(),
            clamped_requests: report.clamped_requests(),
            phases: EventKind::ALL
                .into_iter()
                .map(|kind| JsonPhase {
                    event: kind.as_str(),
                    mean_duration: report.summary.mean_phase(kind),
                })
                .collect(),
            requests: report
                .profiles
                .iter()
                .map(|profile| JsonProfile {
                    node_id: profile.request.node_id,
                    client_sn: profile.request.client_sn,
                    clamped: profile.clamped,
                    phases: EventKind::ALL
                        .into_iter()
                        .map(|kind| JsonPhase {
                            event: kind.as_str(),
                            mean_duration: profile.phase(kind),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let output = JsonOutput {
        generated_at: Utc::now().to_rfc3339(),
        databases,
    };
    let json_str = serde_json::to_string_pretty(&output).wrap_err("failed to serialize JSON")?;
    println!("{}", json_str);

    Ok(())
}

fn print_breakdown_csv(reports: &[(PathBuf, BreakdownReport)]) -> Result<()> {
    println!("db_path,event,mean_duration");

    for (path, report) in reports {
        for kind in EventKind::ALL {
            println!(
                "{},{},{}",
                path.display(),
                kind,
                report.summary.mean_phase(kind)
            );
        }
    }

    Ok(())
}

type TransferResult = (PathBuf, WorkloadStats, Vec<(String, usize)>);

fn handle_transfers(args: TransfersArgs) -> Result<()> {
    if args.csv.is_empty() {
        return Err(eyre!("at least one --csv path is required"));
    }

    let mut results: Vec<TransferResult> = Vec::with_capacity(args.csv.len());
    for path in &args.csv {
        let records = load_transactions(path)?;
        let stats = count_transfers(&records);
        let histogram = method_histogram(&records);
        results.push((path.clone(), stats, histogram));
    }

    match args.output.to_lowercase().as_str() {
        "table" => print_transfer_table(&results)?,
        "json" => print_transfer_json(&results)?,
        "csv" => print_transfer_csv(&results)?,
        _ => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table', 'json', or 'csv'",
                args.output
            ))
        }
    }

    info!(
        exports = results.len(),
        output = %args.output,
        "transfers command completed"
    );

    Ok(())
}

fn print_transfer_table(results: &[TransferResult]) -> Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Export", "Rows", "Transfers", "Share"]);

    for (path, stats, _) in results {
        table.add_row(vec![
            path.display().to_string(),
            stats.total_rows.to_string(),
            stats.transfer_rows.to_string(),
            format!("{:.1}%", stats.transfer_share * 100.0),
        ]);
    }

    println!("{}\n", table);

    for (path, _, histogram) in results {
        if histogram.is_empty() {
            continue;
        }
        println!("Top methods in {}:", path.display());
        for (method, count) in histogram.iter().take(10) {
            println!("  {:<24} {}", method, count);
        }
        println!();
    }

    Ok(())
}

fn print_transfer_json(results: &[TransferResult]) -> Result<()> {
    use serde::Serialize;

    #[derive(Serialize)]
    struct JsonMethod {
        method: String,
        rows: usize,
    }

    #[derive(Serialize)]
    struct JsonExport {
        csv_path: String,
        total_rows: usize,
        transfer_rows: usize,
        transfer_share: f64,
        methods: Vec<JsonMethod>,
    }

    #[derive(Serialize)]
    struct JsonOutput {
        generated_at: String,
        exports: Vec<JsonExport>,
    }

    let exports: Vec<JsonExport> = results
        .iter()
        .map(|(path, stats, histogram)| JsonExport {
            csv_path: path.display().to_string(),
            total_rows: stats.total_rows,
            transfer_rows: stats.transfer_rows,
            transfer_share: stats.transfer_share,
            methods: histogram
                .iter()
                .map(|(method, rows)| JsonMethod {
                    method: method.clone(),
                    rows: *rows,
                })
                .collect(),
        })
        .collect();

    let output = JsonOutput {
        generated_at: Utc::now().to_rfc3339(),
        exports,
    };
    let json_str = serde_json::to_string_pretty(&output).wrap_err("failed to serialize JSON")?;
    println!("{}", json_str);

    Ok(())
}

fn print_transfer_csv(results: &[TransferResult]) -> Result<()> {
    println!("csv_path,total_rows,transfer_rows,transfer_share");

    for (path, stats, _) in results {
        println!(
            "{},{},{},{}",
            path.display(),
            stats.total_rows,
            stats.transfer_rows,
            stats.transfer_share,
        );
    }

    Ok(())
}

fn handle_status(args: StatusArgs) -> Result<()> {
    for path in &args.db {
        let store = EventStore::open(path)?;

        let event_count = store.count_events().wrap_err("failed to query event count")?;
        let request_count = store
            .count_distinct_requests()
            .wrap_err("failed to query request count")?;
        let ts_range = store
            .timestamp_range()
            .wrap_err("failed to query timestamp range")?;
        let name_counts = store
            .event_name_counts()
            .wrap_err("failed to query event name counts")?;

        let (db_size, modified) = match std::fs::metadata(path) {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .ok()
                    .map(|mtime| {
                        DateTime::<Utc>::from(mtime)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_else(|| "N/A".to_string());
                (format!("{} KB", metadata.len() / 1_000), modified)
            }
            Err(_) => ("N/A".to_string(), "N/A".to_string()),
        };

        let db_path = path.display().to_string();
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Metric", "Value"]);
        table.add_row(vec!["Database Path", db_path.as_str()]);
        table.add_row(vec!["DB Size", db_size.as_str()]);
        table.add_row(vec!["Last Modified", modified.as_str()]);
        table.add_row(vec!["Event Rows", event_count.to_string().as_str()]);
        table.add_row(vec!["Distinct Requests", request_count.to_string().as_str()]);
        let range_str = match ts_range {
            Some((min, max)) => format!("{} - {}", min, max),
            None => "No events in database".to_string(),
        };
        table.add_row(vec!["Timestamp Range", range_str.as_str()]);

        println!("\n{}\n", table);

        if !name_counts.is_empty() {
            let mut events_table = Table::new();
            events_table.load_preset(UTF8_BORDERS_ONLY);
            events_table.set_header(vec!["Event", "Rows"]);
            for (name, count) in &name_counts {
                events_table.add_row(vec![name.clone(), count.to_string()]);
            }
            println!("{}\n", events_table);
        }

        info!(
            db_path = %path.display(),
            events = event_count,
            requests = request_count,
            "status queried"
        );
    }

    info!(databases = args.db.len(), "status command completed");

    Ok(())
}
