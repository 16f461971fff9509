//! termflow - typed operation graphs over named terms.
//!
//! ## Architecture
//!
//! - **Engine**: `Operation` instances validate their named input lists
//!   against per-kind descriptors (arity bounds, accepted payload kinds) and
//!   compute results lazily; a `Transformation` owns the operations, binds
//!   terms, and evaluates the reference graph in topological order.
//! - **Spec layer**: transform.json is parsed into raw serde shapes and
//!   validated into a `Transformation`.
//! - **Reports**: evaluation outcomes aggregate into serializable views,
//!   rendered as a self-contained HTML drill-down or a text summary.

pub mod diagnostics;
pub mod error;
pub mod ops;
pub mod path;
pub mod problems;
pub mod render;
pub mod report;
pub mod spec;
pub mod transform;
pub mod value;

// Re-exports for convenience
pub use error::EngineError;
pub use ops::{DESCRIPTORS, Descriptor, InputSlot, OpKind, Operation};
pub use path::Path;
pub use problems::{Problem, Problems, Severity, State};
pub use report::{ReportData, build_report_data};
pub use spec::TransformSpec;
pub use transform::{Outcome, Transformation};
pub use value::{Payload, Value, ValueKind};

pub type Result<T> = anyhow::Result<T>;
