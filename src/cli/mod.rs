//! Argument groups shared by the payload and mass-change binaries.

use crate::batch::{BatchConfig, BatchFilters, UpdateFields};
use clap::Args;

/// Which orders to select and what to write onto them.
///
/// Defaults reproduce the recorded test case (plant 142A moved to 140A).
#[derive(Args, Debug, Clone)]
pub struct PayloadArgs {
    /// Material number prefix (`startswith(Material, ...)`)
    #[arg(long, default_value = "J01AA0119J35002001")]
    pub material: String,
    /// Plant the orders currently sit in
    #[arg(long, default_value = "142A")]
    pub plant: String,
    /// Sales organization
    #[arg(long, default_value = "142")]
    pub sales_org: String,
    /// Creation date, YYYY-MM-DD
    #[arg(long, default_value = "2026-01-13")]
    pub date: String,
    /// New requirement segment
    #[arg(long, default_value = "PPCOMFR")]
    pub new_segment: String,
    /// New plant
    #[arg(long, default_value = "140A")]
    pub new_plant: String,
    /// New storage location
    #[arg(long, default_value = "ROD")]
    pub new_storage_location: String,
}

impl PayloadArgs {
    pub fn filters(&self) -> BatchFilters {
        BatchFilters {
            material_starts_with: self.material.clone(),
            plant: self.plant.clone(),
            sales_org: self.sales_org.clone(),
            creation_date: self.date.clone(),
        }
    }

    pub fn fields(&self) -> UpdateFields {
        UpdateFields {
            requirement_segment: self.new_segment.clone(),
            plant: self.new_plant.clone(),
            storage_location: self.new_storage_location.clone(),
        }
    }
}

/// Overrides on top of `BatchConfig::from_env()`.
#[derive(Args, Debug, Clone, Default)]
pub struct BoundaryArgs {
    /// Batch boundary id (`batch_<ID>`)
    #[arg(long)]
    pub batch_boundary: Option<String>,
    /// Changeset boundary id (`changeset_<ID>`)
    #[arg(long)]
    pub changeset_boundary: Option<String>,
    /// SAP client used in embedded request URLs
    #[arg(long)]
    pub sap_client: Option<String>,
}

impl BoundaryArgs {
    pub fn apply(&self, mut cfg: BatchConfig) -> BatchConfig {
        if let Some(b) = &self.batch_boundary {
            cfg.batch_boundary = b.clone();
        }
        if let Some(c) = &self.changeset_boundary {
            cfg.changeset_boundary = c.clone();
        }
        if let Some(client) = &self.sap_client {
            cfg.sap_client = client.clone();
        }
        cfg
    }
}
