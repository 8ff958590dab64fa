//! The reporting engine seam
//!
//! Request handling only ever sees these three operations. The JVM backend
//! lives in [`crate::jvm`]; tests use [`crate::testing::StubEngine`].

use std::fmt;
use std::path::Path;

use crate::error::EngineError;
use crate::request::ReportParameters;
use crate::settings::ConnectionEntry;

/// Where the fill step pulls rows from
#[derive(Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A registered JDBC connection. The engine opens it for the fill
    /// step and closes it before returning.
    Connection {
        name: String,
        descriptor: ConnectionEntry,
    },
    /// Placeholder with no rows
    Empty,
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Connection { name, .. } => write!(f, "Connection({})", name),
            DataSource::Empty => f.write_str("Empty"),
        }
    }
}

/// Compile, fill and export. Implementations block the calling thread.
pub trait ReportEngine: Send + Sync + 'static {
    /// A report bound to data, ready for export
    type Filled: Send;

    /// Compile the template at `template` into a binary artifact at `artifact`
    fn compile(&self, template: &Path, artifact: &Path) -> Result<(), EngineError>;

    /// Fill a compiled artifact with parameters and rows from `source`
    fn fill(
        &self,
        artifact: &Path,
        parameters: &ReportParameters,
        source: &DataSource,
    ) -> Result<Self::Filled, EngineError>;

    /// Write a filled report as PDF to `output`
    fn export_pdf(&self, filled: &Self::Filled, output: &Path) -> Result<(), EngineError>;
}
