//! JSON2OPM: Exchange JSON to OPM conversion with A/Z link analysis
//!
//! Converts fiber-optic test results exported in the Exchange JSON schema
//! into the OPM result format, pairs measurements taken from the two ends
//! of each link (A side / Z side), checks every pair for polarity,
//! wavelength, and length consistency, and merges consistent pairs into
//! single multi-fiber results.
//!
//! ## Pipeline
//!
//! - **loader**: one `FiberRecord` per convertible input file
//! - **pairing**: records grouped by link identity into pairs, unmatched
//!   singletons, and ambiguous duplicates
//! - **analysis**: per-pair discrepancy detection and merge eligibility
//! - **merge**: one multi-fiber OPM document per eligible pair
//! - **report**: run summary, problem blocks, and the mismatch CSV

pub mod analysis;
pub mod config;
pub mod loader;
pub mod merge;
pub mod opm;
pub mod pairing;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod types;

// Re-export run configuration
pub use config::ConvertConfig;

// Re-export the core model
pub use types::{
    Discrepancy, DiscrepancyKind, DiscrepancySeverity, FiberPair, FiberRecord, MergedResult,
    PairAnalysis, PairOutcome, Side,
};

// Re-export the run surface
pub use pipeline::{convert_directory, RunError, RunOptions};
pub use report::{FileOutcome, LinkOutcome, ReportSeverity, RunReport, RunSummary};
