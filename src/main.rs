// Entry point and high-level CLI flow.
//
// Every subcommand loads and cleans the sheet once, prints a console preview
// and, where there is a table to keep, writes it next to the other outputs.
use anyhow::{bail, Context, Result};
use clap::Parser;
use shipment_report::config::{Cli, Commands, RecordsArgs, TrendArgs};
use shipment_report::loader::{self, LoadReport};
use shipment_report::types::ShipmentRecord;
use shipment_report::{aggregate, output, reports, util};
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn print_load_report(report: &LoadReport) {
    println!(
        "Processing dataset... ({} rows read, {} loaded)",
        util::format_int(report.total_rows),
        util::format_int(report.loaded_rows)
    );
    if report.parse_errors > 0 {
        println!(
            "Note: {} rows skipped due to parse errors.",
            util::format_int(report.parse_errors)
        );
    }
    if report.missing_period + report.missing_status > 0 {
        println!(
            "Note: {} rows without arrival month, {} without status; they are left out of reports.",
            util::format_int(report.missing_period),
            util::format_int(report.missing_status)
        );
    }
    if report.malformed_numbers > 0 {
        println!(
            "Info: {} non-numeric cells in numeric columns treated as blank.",
            util::format_int(report.malformed_numbers)
        );
    }
    println!();
}

/// Use the requested month or fall back to the newest one in the data.
fn pick_month(data: &[ShipmentRecord], month: Option<String>) -> Result<String> {
    match month {
        Some(m) => {
            reports::require_month(&m)?;
            Ok(m)
        }
        None => reports::available_periods(data)
            .into_iter()
            .find(|p| util::is_valid_period(p))
            .context("no arrival months in the data"),
    }
}

fn handle_periods(data: &[ShipmentRecord]) {
    let periods = reports::available_periods(data);
    if periods.is_empty() {
        println!("(no data)");
    }
    for p in periods {
        println!("{p}");
    }
}

fn handle_snapshot(data: &[ShipmentRecord], month: String, out_dir: &Path) -> Result<()> {
    let snapshot = reports::month_snapshot(data, &month)?;
    println!("Shipment timeliness for {month}\n");
    output::preview_rows(&reports::snapshot_cards(&snapshot), usize::MAX);
    println!("{}\n", reports::snapshot_narrative(&snapshot));
    let file = out_dir.join(format!("snapshot_{month}.json"));
    output::write_json(&file, &snapshot)?;
    println!("(Snapshot exported to {})", file.display());
    Ok(())
}

fn handle_trend(data: &[ShipmentRecord], cli: &Cli, args: &TrendArgs) -> Result<()> {
    let periods = reports::available_periods(data);
    let (default_start, default_end) = reports::default_range(&periods).unwrap_or_default();
    let end = args.to.clone().unwrap_or(default_end);
    let start = match &args.from {
        Some(s) => s.clone(),
        None if args.to.is_some() => util::prev_month(&end)
            .and_then(|m| util::prev_month(&m))
            .unwrap_or_else(|| end.clone()),
        None => default_start,
    };
    if start.is_empty() || end.is_empty() {
        bail!("no arrival months in the data; pass --from and --to");
    }

    let query = args.to_query(start, end, cli.category);
    let agg = aggregate(data, &query).context("invalid trend arguments")?;
    if agg.skipped.total() > 0 {
        warn!(
            missing_period = agg.skipped.missing_period,
            missing_status = agg.skipped.missing_status,
            "records left out of the trend"
        );
    }

    let dimension = query.dimension.map(|d| d.label());
    let table = reports::trend_table(&agg, dimension, query.include_status_breakdown);
    println!(
        "Monthly trend {} ~ {} ({}, {} records)\n",
        query.period_start,
        query.period_end,
        cli.category,
        util::format_int(agg.total_records())
    );
    output::preview_table(&table, cli.preview_rows, true);
    if let Some((abs, dev)) = reports::summary_deviation(&agg) {
        info!(mean_abs_deviation = abs, mean_deviation = dev, "trend summary");
    }

    let file = cli.out_dir.join(format!(
        "trend_{}_{}_{}.csv",
        cli.category, query.period_start, query.period_end
    ));
    output::write_table_csv(&file, &table)?;
    println!("(Full table exported to {})", file.display());
    Ok(())
}

fn handle_detail(data: &[ShipmentRecord], month: String, cli: &Cli) -> Result<()> {
    let listing = reports::detail_rows(data, &month)?;
    let table = reports::detail_table(&listing);
    println!("Shipments arriving {month} (* = above column average)\n");
    output::preview_table(&table, cli.preview_rows, true);
    let file = cli
        .out_dir
        .join(format!("detail_{}_{month}.csv", cli.category));
    output::write_table_csv(&file, &table)?;
    println!("(Full table exported to {})", file.display());
    Ok(())
}

fn handle_histogram(data: &[ShipmentRecord], month: String, out_dir: &Path) -> Result<()> {
    let hist = reports::deviation_histogram(data, &month)?;
    println!("Early / on time ({month})\n");
    let early = reports::histogram_rows(&hist.early);
    output::preview_rows(&early, usize::MAX);
    println!("Delayed ({month})\n");
    let delayed = reports::histogram_rows(&hist.delayed);
    output::preview_rows(&delayed, usize::MAX);

    let rows: Vec<_> = early.into_iter().chain(delayed).collect();
    let file = out_dir.join(format!("histogram_{month}.csv"));
    output::write_csv(&file, &rows)?;
    println!("(Buckets exported to {})", file.display());
    Ok(())
}

fn handle_records(data: &[ShipmentRecord], cli: &Cli, args: &RecordsArgs) -> Result<()> {
    let listing = reports::source_rows(data, &args.to_filter())?;
    let table = reports::source_table(&listing);
    println!(
        "Source rows: {} of {} match\n",
        util::format_int(listing.matched()),
        util::format_int(listing.total)
    );
    output::preview_table(&table, cli.preview_rows, false);
    let scope = args.month.as_deref().unwrap_or("all");
    let file = cli
        .out_dir
        .join(format!("records_{}_{scope}.csv", cli.category));
    output::write_table_csv(&file, &table)?;
    println!("(Matching rows exported to {})", file.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (data, load_report) = loader::load_and_clean(&cli.data, cli.category)
        .with_context(|| format!("failed to load {}", cli.data.display()))?;
    print_load_report(&load_report);

    if !matches!(cli.command, Commands::Periods) {
        std::fs::create_dir_all(&cli.out_dir)
            .with_context(|| format!("failed to create {}", cli.out_dir.display()))?;
    }

    match &cli.command {
        Commands::Periods => handle_periods(&data),
        Commands::Snapshot { month } => {
            let month = pick_month(&data, month.clone())?;
            handle_snapshot(&data, month, &cli.out_dir)?;
        }
        Commands::Trend(args) => handle_trend(&data, &cli, args)?,
        Commands::Detail { month } => {
            let month = pick_month(&data, month.clone())?;
            handle_detail(&data, month, &cli)?;
        }
        Commands::Histogram { month } => {
            let month = pick_month(&data, month.clone())?;
            handle_histogram(&data, month, &cli.out_dir)?;
        }
        Commands::Records(args) => handle_records(&data, &cli, args)?,
    }
    Ok(())
}
