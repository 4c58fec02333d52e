use anyhow::Result;
use clap::Parser;
use s4_probe::batch::inspect::{crlf_positions, render_escaped, write_artifacts, PayloadStats};
use s4_probe::batch::{build_batch_payload, merge_body, BatchConfig, HeaderProfile};
use s4_probe::cli::{BoundaryArgs, PayloadArgs};
use s4_probe::report::{banner, rule};
use std::path::PathBuf;
use tracing::info;

/// Build the mass-change `$batch` payload offline and write it out for inspection.
#[derive(Parser, Debug)]
#[command(name = "batch_payload", version)]
struct Cli {
    #[command(flatten)]
    payload: PayloadArgs,
    #[command(flatten)]
    boundaries: BoundaryArgs,
    /// Use the direct-backend header profile with this Host header
    #[arg(long)]
    direct_host: Option<String>,
    /// Directory for the output files
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// File name prefix for payload, hex dump and stats
    #[arg(long, default_value = "batch_payload")]
    prefix: String,
}

fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("batch_payload", "warn")?;
    let cli = Cli::parse();

    let mut cfg = cli.boundaries.apply(BatchConfig::from_env());
    if let Some(host) = cli.direct_host.clone() {
        cfg = cfg.with_profile(HeaderProfile::Direct { host });
    }

    let filters = cli.payload.filters();
    let fields = cli.payload.fields();
    let payload = build_batch_payload(&filters, &fields, &cfg);
    let stats = PayloadStats::of(&payload, &cfg);

    banner("BATCH PAYLOAD (OData v2 $batch, CRLF line endings)");
    println!("Filters:");
    println!("  material startswith: {}", filters.material_starts_with);
    println!("  plant:               {}", filters.plant);
    println!("  sales org:           {}", filters.sales_org);
    println!("  creation date:       {}", filters.creation_date);
    println!("New values:");
    println!("  requirement segment: {}", fields.requirement_segment);
    println!("  plant:               {}", fields.plant);
    println!("  storage location:    {}", fields.storage_location);
    println!();
    println!("MERGE body: {}", merge_body(&fields));
    println!("Content-Type: {}", cfg.content_type());
    println!("{}", rule());
    println!("{}", render_escaped(&payload));
    println!("{}", rule());

    print!("{}", stats.render(&cfg));
    println!("CRLF pairs: {}", crlf_positions(&payload).len());
    if !stats.looks_well_formed() {
        println!("WARNING: payload structure looks wrong, see counts above");
    }

    let paths = write_artifacts(&cli.out_dir, &cli.prefix, &payload, &cfg)?;
    info!(
        payload = %paths.payload.display(),
        hex = %paths.hex.display(),
        stats = %paths.stats.display(),
        "batch_payload: artifacts written"
    );
    println!();
    println!("Saved:");
    println!("  {}", paths.payload.display());
    println!("  {}", paths.hex.display());
    println!("  {}", paths.stats.display());
    Ok(())
}
