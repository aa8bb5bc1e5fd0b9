//! Archive clients: the boundary where a cone search leaves the process.
//!
//! The pipeline only ever sees [`ArchiveClient`]; how the request is carried
//! out (a TAP service, a file on disk) is up to the implementation. Any
//! predicate attached to the query is advisory: results are filtered again
//! client-side.

mod file;
mod gaia;

pub use file::FileArchive;
pub use gaia::GaiaTapClient;

use crate::data::model::RawRecord;
use crate::error::PipelineResult;
use crate::query::QueryParameters;

/// Executes a cone search and returns the raw rows, or a `Query` error.
///
/// Calls block until the archive answers; timeouts and retries, if any,
/// belong to the implementation.
pub trait ArchiveClient {
    /// Short label for log lines.
    fn name(&self) -> &str;

    fn cone_search(&self, params: &QueryParameters) -> PipelineResult<Vec<RawRecord>>;
}
