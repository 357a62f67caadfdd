//! lm-etl - the Lendmill ETL pipeline
//!
//! Extracts operational, reference, and market rows from the warehouse's
//! source tables, validates and enriches them, and loads the analytical star
//! schema. One orchestrator run sequences extract -> transform -> load,
//! persists its audit trail, and advances the incremental watermarks.

pub mod context;
pub mod error;
pub mod extract;
pub mod load;
pub mod logging;
pub mod orchestrator;
pub mod records;
pub mod report;
pub mod transform;

pub use context::RunContext;
pub use error::{EtlError, EtlResult};
pub use extract::{ExtractBundle, ExtractResult, Extractor, SourceSystem};
pub use load::{LoadResult, Loader};
pub use logging::{timed_step, EtlLogger, StepMetrics};
pub use orchestrator::EtlOrchestrator;
pub use report::{RunReport, RunStatus};
pub use transform::{TransformBundle, TransformResult, Transformer};
