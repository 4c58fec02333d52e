use anyhow::Result;
use clap::{Parser, Subcommand};
use s4_probe::cli::PayloadArgs;
use s4_probe::mass_change::{
    connect_from_env, JobResult, JobStatus, MassChangeRequest, ReadOrdersResult,
};
use s4_probe::report::{banner, excerpt, rule};
use s4_probe::util::env::preflight_check;

#[derive(Parser, Debug)]
#[command(name = "mass_change", version, about = "Call the deployed mass-change service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Schedule a mass change job (scheduleMassChange)
    Schedule {
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Schedule the inverse job (reverseMassChange)
    Reverse {
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// List the order items matching the filters (readOrders)
    Read {
        #[command(flatten)]
        payload: PayloadArgs,
    },
    /// Ask the service which S/4HANA endpoints it can reach (testS4Endpoints)
    TestEndpoints,
}

#[tokio::main]
async fn main() -> Result<()> {
    s4_probe::util::env::bootstrap_cli("mass_change", "info")?;
    let cli = Cli::parse();

    preflight_check(
        "mass_change",
        &[
            "MASS_CHANGE_APP_URL",
            "MASS_CHANGE_CLIENT_ID",
            "MASS_CHANGE_CLIENT_SECRET",
        ],
        &["MASS_CHANGE_APP_URL", "MASS_CHANGE_CLIENT_ID", "XSUAA_URL"],
    )?;
    let client = connect_from_env("s4-probe/mass_change").await?;

    match cli.command {
        Commands::Schedule { payload } => {
            banner("scheduleMassChange");
            let request = to_request(&payload);
            print_request(&request);
            print_job(&client.schedule(&request).await?);
        }
        Commands::Reverse { payload } => {
            banner("reverseMassChange");
            let request = to_request(&payload);
            print_request(&request);
            print_job(&client.reverse(&request).await?);
        }
        Commands::Read { payload } => {
            banner("readOrders");
            print_orders(&client.read_orders(&payload.filters()).await?);
        }
        Commands::TestEndpoints => {
            banner("testS4Endpoints");
            let report = client.test_s4_endpoints().await?;
            for check in &report.results {
                println!("{}", check.endpoint);
                println!(
                    "  status: {} {}",
                    check.status,
                    check
                        .status_code
                        .map(|c| c.to_string())
                        .unwrap_or_default()
                );
                if let Some(len) = check.content_length {
                    println!("  content length: {}", len);
                }
                if let Some(preview) = &check.preview {
                    println!("  preview: {}", excerpt(preview, 120));
                }
                if let Some(error) = &check.error {
                    println!("  error: {}", error);
                }
            }
            println!("{}", rule());
            let working: Vec<&str> = report.working().map(|c| c.endpoint.as_str()).collect();
            if working.is_empty() {
                println!("No endpoint answered successfully");
            } else {
                println!("Working endpoints:");
                for endpoint in working {
                    println!("  - {}", endpoint);
                }
            }
            if let Some(rec) = &report.recommendation {
                println!("Recommendation: {}", rec);
            }
        }
    }
    Ok(())
}

fn to_request(payload: &PayloadArgs) -> MassChangeRequest {
    MassChangeRequest {
        filters: payload.filters(),
        fields_to_update: payload.fields(),
    }
}

fn print_request(request: &MassChangeRequest) {
    println!("Request:");
    println!(
        "{}",
        serde_json::to_string_pretty(request).unwrap_or_default()
    );
    println!();
}

fn print_job(result: &JobResult) {
    match result.status {
        JobStatus::JobScheduled => println!("JOB SCHEDULED"),
        JobStatus::Error => println!("ERROR"),
        JobStatus::Other => println!("Unrecognized status"),
    }
    if let Some(id) = &result.id {
        println!("  ID:        {}", id);
    }
    if let Some(name) = &result.job_name {
        println!("  Job name:  {}", name);
    }
    if let Some(ts) = &result.timestamp {
        println!("  Timestamp: {}", ts);
    }
    if let Some(msg) = &result.message {
        println!("  Message:   {}", msg);
    }
    if let Some(link) = &result.fiori_app_link {
        println!("  Fiori app: {}", link);
    }
}

fn print_orders(result: &ReadOrdersResult) {
    let count = result.count.unwrap_or(result.orders.len() as u64);
    println!("Matching items: {}", count);
    for item in &result.orders {
        println!(
            "  {:<12} plant={:<6} segment={:<10} sloc={}",
            item.sales_order.as_deref().unwrap_or("-"),
            item.plant.as_deref().unwrap_or("-"),
            item.requirement_segment.as_deref().unwrap_or("-"),
            item.storage_location.as_deref().unwrap_or("-")
        );
    }
}
