pub mod batch;
pub mod cli;
pub mod compare;
pub mod destinations;
pub mod http;
pub mod mass_change;
pub mod odata;
pub mod report;
pub mod xsuaa;

pub mod util {
    pub mod env;
    pub mod logging;
}

pub use batch::{build_batch_payload, BatchConfig, BatchFilters, HeaderProfile, UpdateFields};
