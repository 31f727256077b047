//! Query service and trace reconstruction for Chronicle.
//!
//! Reads are tenant-guarded: a caller context that does not match the
//! filter's tenant gets [`QueryError::AccessDenied`], never partial data.
//! Trace reconstruction turns the flat events of one workflow run into a
//! forest linked by `parent_event_id`, in time linear in the number of
//! events.

mod forest;
mod query;

pub use forest::{build_forest, TraceNode};
pub use query::{QueryContext, QueryError, QueryService};

// The filter vocabulary is shared with the storage layer.
pub use chronicle_backends::{EventFilter, SortOrder};
