mod attribution;
mod db;
mod error;
mod fetch;
mod model;
mod normalize;
mod parser;
mod pipeline;
mod reconcile;
mod settings;
mod writer;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use attribution::SourceInfo;
use pipeline::{fmt_mm, IngestOptions};

#[derive(Parser)]
#[command(name = "target_catalog", about = "Sputtering target catalog ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, reconcile and upsert one vendor catalog page
    Ingest {
        /// Vendor name recorded on the source
        #[arg(long)]
        vendor: String,
        /// Page URL (fetched unless --file is given, then only recorded)
        #[arg(long, required_unless_present = "file")]
        url: Option<String>,
        /// Read page content from a local file
        #[arg(long)]
        file: Option<PathBuf>,
        /// Page title (default: the page's <title>)
        #[arg(long)]
        title: Option<String>,
        /// Diameter for tables without a "<n> mm" heading, e.g. "62mm"
        #[arg(long)]
        diameter: Option<String>,
        /// Ignore the page cache and fetch again
        #[arg(long)]
        refresh: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one stored target
    Show {
        part_number: String,
    },
    /// Show catalog statistics
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = settings::load()?;

    let result = match cli.command {
        Commands::Ingest {
            vendor,
            url,
            file,
            title,
            diameter,
            refresh,
            json,
        } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;

            let (url, content) = match (url, file) {
                (url, Some(path)) => {
                    let content = fetch::read_file(&path)?;
                    let url = url.unwrap_or_else(|| format!("file://{}", path.display()));
                    (url, content)
                }
                (Some(url), None) => {
                    let content = fetch::retrieve(&conn, &settings, &url, refresh).await?;
                    (url, content)
                }
                (None, None) => anyhow::bail!("either --url or --file is required"),
            };

            let source = SourceInfo { vendor, url, title };
            let options = IngestOptions {
                declared_diameter: diameter,
                strict_units: settings.strict_units,
                sample_size: settings.sample_size,
            };
            let report = pipeline::ingest(&conn, &source, &content, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
            Ok(())
        }
        Commands::Show { part_number } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let Some(t) = db::fetch_target(&conn, &part_number)? else {
                println!("No target with part number {}.", part_number);
                return Ok(());
            };
            println!("Part:       {}", t.part_number);
            println!("Material:   {}", t.material);
            println!("Purity:     {}", t.purity.as_deref().unwrap_or("-"));
            println!("Shape:      {}", t.shape.as_str());
            println!("Diameter:   {} mm", fmt_mm(t.diameter_mm));
            println!(
                "O.D./I.D.:  {} / {} mm",
                fmt_mm(t.outer_diameter_mm),
                fmt_mm(t.inner_diameter_mm)
            );
            println!("Thickness:  {} mm", fmt_mm(t.thickness_mm));
            println!("Backing:    {}", t.backing_plate.as_deref().unwrap_or("-"));
            println!("Alloy:      {}", t.alloy_ratio.as_deref().unwrap_or("-"));
            match t.price {
                Some(p) => println!("Price:      ${:.2}", p),
                None => println!("Price:      -"),
            }
            if !t.notes.is_empty() {
                println!("Notes:      {}", t.notes.join(", "));
            }
            println!(
                "Source:     {} {}",
                t.vendor.as_deref().unwrap_or("-"),
                t.source_url.as_deref().unwrap_or("")
            );
            println!("Strategy:   {}", t.strategy);
            println!("Created:    {}", t.created_at);
            println!("Updated:    {}", t.updated_at);
            println!("\n{}", t.raw_excerpt);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Sources:   {}", s.sources);
            println!("Targets:   {}", s.targets);
            println!("Cached:    {}", s.cached_pages);
            if !s.by_shape.is_empty() {
                println!("\n--- By shape ---");
                for (shape, n) in &s.by_shape {
                    println!("  {:<14} {:>6}", shape, n);
                }
            }
            if !s.by_strategy.is_empty() {
                println!("\n--- By strategy ---");
                for (strategy, n) in &s.by_strategy {
                    println!("  {:<14} {:>6}", strategy, n);
                }
            }
            let sources = db::fetch_sources(&conn)?;
            if !sources.is_empty() {
                println!("\n--- Sources ---");
                for src in &sources {
                    println!(
                        "  #{} {} | {} | {} | last fetched {}",
                        src.id,
                        src.vendor,
                        src.url,
                        src.title.as_deref().unwrap_or("-"),
                        src.last_fetched_at
                    );
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
