//! `cartons-inventory`: carton target inventory engine.
//!
//! Pure engine crate: receives pre-loaded carton rows and a target lookup,
//! returns per-carton reports. Matching, placeholder substitution and
//! outlier checks run per entry; cartons run in parallel.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod load;
pub mod lookup;
pub mod matcher;
pub mod model;
pub mod outlier;
pub mod placeholder;
pub mod record;

pub use config::{CartonConfig, InventoryConfig};
pub use engine::{process_carton, run};
pub use error::InventoryError;
pub use lookup::{TargetLookup, TargetSnapshot};
pub use model::{CartonReport, InventoryInput, InventoryRun};
