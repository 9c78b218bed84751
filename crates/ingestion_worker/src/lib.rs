pub mod domain;
mod ingestion_worker;
pub mod mqtt;

pub use domain::*;
pub use ingestion_worker::*;
