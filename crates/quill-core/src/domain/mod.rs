//! Domain model (IDs, status, task record, snapshot, report payload, errors).

pub mod errors;
pub mod ids;
pub mod report;
pub mod snapshot;
pub mod state;
pub mod task;

pub use self::errors::{BackendError, GenerationError, QuillError, StoreError};
pub use self::ids::ReportId;
pub use self::report::ReportDocument;
pub use self::snapshot::ReportSnapshot;
pub use self::state::{TaskStatus, UnknownStatus};
pub use self::task::{NewReportTask, ReportTask};
