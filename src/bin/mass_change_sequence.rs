use anyhow::Result;
use chrono::Local;
use clap::Parser;
use s4_probe::batch::{BatchFilters, UpdateFields};
use s4_probe::mass_change::{
    connect_from_env, run_sequence, JobStatus, MassChangeRequest, SequencePlan, SequenceStep,
};
use s4_probe::report::rule;
use s4_probe::util::env::preflight_check;
use std::time::Duration;

/// READ -> reverse -> READ -> forward -> READ against the deployed service.
///
/// The forward job moves the orders from `--from-plant` to `--to-plant`; the
/// reverse job moves them back with the original segment and storage location.
#[derive(Parser, Debug)]
#[command(name = "mass_change_sequence", version)]
struct Cli {
    #[arg(long, default_value = "J01AA0119J3")]
    material: String,
    #[arg(long, default_value = "142")]
    sales_org: String,
    #[arg(long, default_value = "2026-01-13")]
    date: String,
    #[arg(long, default_value = "142A")]
    from_plant: String,
    #[arg(long, default_value = "140A")]
    to_plant: String,
    /// Segment / storage location written by the forward job
    #[arg(long, default_value = "PPCOMFR")]
    segment: String,
    #[arg(long, default_value = "ROD")]
    storage_location: String,
    /// Segment / storage location restored by the reverse job
    #[arg(long, default_value = "PPCOM99")]
    original_segment: String,
    #[arg(long, default_value = "AFS")]
    original_storage_location: String,
    /// Seconds to wait after each read
    #[arg(long, default_value_t = 2)]
    read_delay: u64,
    /// Seconds to wait for a scheduled job to finish
    #[arg(long, default_value_t = 5)]
    job_delay: u64,
}

impl Cli {
    fn filters(&self, plant: &str) -> BatchFilters {
        BatchFilters {
            material_starts_with: self.material.clone(),
            plant: plant.to_string(),
            sales_org: self.sales_org.clone(),
            creation_date: self.date.clone(),
        }
    }

    fn plan(&self) -> SequencePlan {
        SequencePlan {
            forward: MassChangeRequest {
                filters: self.filters(&self.from_plant),
                fields_to_update: UpdateFields {
                    requirement_segment: self.segment.clone(),
                    plant: self.to_plant.clone(),
                    storage_location: self.storage_location.clone(),
                },
            },
            reverse: MassChangeRequest {
                filters: self.filters(&self.to_plant),
                fields_to_update: UpdateFields {
                    requirement_segment: self.original_segment.clone(),
                    plant: self.from_plant.clone(),
                    storage_location: self.original_storage_location.clone(),
                },
            },
            read_delay: Duration::from_secs(self.read_delay),
            job_delay: Duration::from_secs(self.job_delay),
        }
    }
}

fn print_step(step: &SequenceStep) {
    println!();
    println!("{}", rule());
    match step {
        SequenceStep::Read { plant, result } => {
            println!("READ - plant {}", plant);
            println!("{}", rule());
            let count = result.count.unwrap_or(result.orders.len() as u64);
            println!("Orders found: {}", count);
            for order in &result.orders {
                println!(
                    "  Order: {} | Plant: {} | ReqSeg: {} | Storage: {}",
                    order.sales_order.as_deref().unwrap_or("-"),
                    order.plant.as_deref().unwrap_or("-"),
                    order.requirement_segment.as_deref().unwrap_or("-"),
                    order.storage_location.as_deref().unwrap_or("-")
                );
            }
        }
        SequenceStep::Job { action, result } => {
            println!("{}", action.path());
            println!("{}", rule());
            let status = match result.status {
                JobStatus::JobScheduled => "JOB_SCHEDULED",
                JobStatus::Error => "ERROR",
                JobStatus::Other => "?",
            };
            println!("Job ID:    {}", result.id.as_deref().unwrap_or("-"));
            println!("Status:    {}", status);
            println!("Timestamp: {}", result.timestamp.as_deref().unwrap_or("-"));
            if let Some(msg) = &result.message {
                println!("Message:   {}", msg);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("mass_change_sequence", "warn")?;
    let cli = Cli::parse();
    preflight_check(
        "mass_change_sequence",
        &[
            "MASS_CHANGE_APP_URL",
            "MASS_CHANGE_CLIENT_ID",
            "MASS_CHANGE_CLIENT_SECRET",
        ],
        &["MASS_CHANGE_APP_URL", "MASS_CHANGE_CLIENT_ID"],
    )?;

    let hashes = "#".repeat(60);
    println!("{}", hashes);
    println!("# SEQUENCE: READ -> REVERSE -> READ -> FORWARD -> READ");
    println!("# {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("{}", hashes);

    let client = connect_from_env("s4-probe/mass_change_sequence").await?;
    let plan = cli.plan();
    let steps = run_sequence(&client, &plan, print_step).await?;

    println!();
    println!("{}", hashes);
    println!("# DONE ({} steps)", steps.len());
    println!("{}", hashes);
    Ok(())
}
