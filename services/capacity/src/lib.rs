//! Capacity planning batch ETL.
//!
//! Fixed-position regions are cut out of the planning workbook, reshaped from
//! wide to long form, appended to accumulating master workbooks, and used to
//! derive headcount requirement, variance, utilization and maintenance
//! allowance. The `exports` and `backlog` jobs reuse the same I/O and
//! master-file machinery.

pub mod calc;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod master;
pub mod normalize;
pub mod period;
pub mod record;
pub mod region;
pub mod report;
pub mod retention;
pub mod schema;
pub mod stages;
pub mod table;
pub mod unpivot;
pub mod workbook;

pub use context::RunContext;
pub use error::{PlanningError, Result};
pub use report::{RunReport, StepOutcome};
pub use table::{Cell, Table};
