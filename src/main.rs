use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rally_reglist::{
    open_database, run_staged, select_lookup, stage_csv, CanonicalCsvSink, ContactsCsvSink, InputSource, InputVariant,
    MirrorStore, Pipeline, RallyConfig, RunReport, WordLists,
};

/// Build the registration list for one rally
#[derive(Parser, Debug)]
#[command(name = "rally-reglist")]
#[command(about = "Normalize rally registrations and aggregate entrant statistics")]
#[command(version)]
struct Args {
    /// Rally configuration (TOML)
    #[arg(short, long, default_value = "rally.toml", env = "RALLY_CONFIG")]
    config: PathBuf,

    /// Spelling exceptions and lookup settings (JSON)
    #[arg(short, long, env = "RALLY_WORDS")]
    words: Option<PathBuf>,

    /// Registration CSV, a file path or http(s) URL
    #[arg(long, env = "RALLY_CSV", required_unless_present = "no_csv")]
    csv: Option<String>,

    /// Staging database; defaults to <name><year>.db
    #[arg(long, env = "RALLY_DB")]
    db: Option<PathBuf>,

    /// Reuse the rows already staged instead of loading a CSV
    #[arg(long)]
    no_csv: bool,

    /// The CSV is the saved-report download, not the administrator export
    #[arg(long)]
    report_export: bool,

    /// Write the canonical entrant CSV here
    #[arg(long, env = "RALLY_EXPORT")]
    export: Option<PathBuf>,

    /// Write the address-book contacts CSV here
    #[arg(long, env = "RALLY_CONTACTS")]
    contacts: Option<PathBuf>,

    /// Write the JSON statistics report here
    #[arg(long, env = "RALLY_STATS")]
    stats: Option<PathBuf>,

    /// Local members database used for membership lookup
    #[arg(long, env = "RALLY_MEMBERS_DB")]
    members_db: Option<PathBuf>,

    /// Skip membership lookup entirely
    #[arg(long)]
    no_lookup: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "rally_reglist=debug" } else { "rally_reglist=info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let report = run(&args)?;
    print_summary(&report);

    Ok(())
}

fn run(args: &Args) -> Result<RunReport> {
    let cfg = RallyConfig::from_file(&args.config)?;
    let words = match &args.words {
        Some(path) => WordLists::from_file(path)?,
        None => WordLists::default(),
    };
    let variant = if args.report_export { InputVariant::Report } else { InputVariant::Admin };

    let db_path = args
        .db
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.db", cfg.rally_tag())));
    let mut conn = open_database(&db_path)?;

    if !args.no_csv {
        let csv = args.csv.as_deref().context("--csv is required unless --no-csv is given")?;
        let source = InputSource::parse(csv);
        let content = source.read_to_string()?;
        stage_csv(&mut conn, &cfg, variant, &source.name(), &content)?;
    }

    let lookup = select_lookup(&words, args.members_db.as_deref(), !args.no_lookup)?;
    let mut pipeline = Pipeline::new(cfg.clone(), &words, lookup)?;

    if let Some(path) = &args.export {
        pipeline.add_sink(Box::new(CanonicalCsvSink::create(path)?));
    }
    if let Some(path) = &args.contacts {
        pipeline.add_sink(Box::new(ContactsCsvSink::create(path, &cfg.rally_tag())?));
    }
    if let Some(path) = &cfg.mirror_db {
        pipeline.add_sink(Box::new(MirrorStore::open(path, &cfg)?));
    }

    let report = run_staged(&mut conn, pipeline, variant)?;

    if let Some(path) = &args.stats {
        report.write_json(path)?;
        info!("statistics written to {:?}", path);
    }

    Ok(report)
}

fn print_summary(report: &RunReport) {
    let t = &report.totals;

    println!("🏍️  {} registrations", report.rally);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if let Some(staging) = &report.staging {
        println!("📂 {} ({} rows, staged {})", staging.source, staging.rows, staging.extracted);
    }

    println!("\n👥 Entrants");
    println!("   Riders:    {}", t.riders);
    println!("   Pillions:  {}", t.pillions);
    println!("   Novices:   {}", t.novices);
    println!("   Members:   {}", t.members);
    println!("   Legion:    {} branch, {} riders", t.legion_branch, t.legion_riders);
    println!("   Cancelled: {}", t.cancelled_rows.len());
    println!("   Withdrawn: {}", t.withdrawn);

    println!("\n🎽 Merchandise");
    for size in &t.tshirts_by_size {
        println!("   {:<4} {}", size.size, size.count);
    }
    println!("   Patches: {}  Camping: {}", t.patches, t.camping);

    println!("\n🏍️  Bikes");
    for bike in &t.bikes {
        println!("   {:<16} {}", bike.make, bike.count);
    }

    if !t.routes.is_empty() {
        println!("\n🗺️  Routes");
        for (route, count) in &t.routes {
            println!("   {:<16} {}", route, count);
        }
    }

    if let (Some(lo), Some(hi)) = (t.distance_min, t.distance_max) {
        println!("\n📏 Distance to start: {} - {}", lo, hi);
    }

    println!("\n💷 Money");
    println!("   Payments:    {}", t.money.main_payments);
    println!("   Cash:        {}", t.money.cash);
    println!("   Sponsorship: {}", t.money.sponsorship);
    println!("   Fees due:    {}", t.money.fees_due);
    println!("   Forfeited:   {}", t.money.forfeited);

    if !report.exports.is_empty() {
        println!("\n💾 Exports");
        for export in &report.exports {
            println!("   {}: {} rows", export.sink, export.rows);
        }
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let warnings = report.warnings();
    if warnings == 0 {
        println!("✅ Done, no warnings");
    } else {
        println!("⚠️  Done with {} warnings (see log)", warnings);
    }
}
