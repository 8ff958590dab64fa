//! JasperReports bridge
//!
//! This crate hosts everything behind the HTTP endpoint:
//! - Settings document (registered reports, drivers, connections)
//! - Classpath assembly and SQL driver registration
//! - The [`ReportEngine`] seam and its JNI backend
//! - Report generation (compile → fill → export) with scoped cleanup
//!
//! # Feature Flags
//!
//! - `server` (default): Enables async `generate_report` with timeout (requires tokio)
//! - `test-util`: Exposes [`testing::StubEngine`] for downstream tests

pub mod bootstrap;
pub mod classpath;
pub mod drivers;
pub mod engine;
pub mod error;
pub mod generate;
pub mod jvm;
pub mod request;
pub mod settings;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bootstrap::{bootstrap, BootstrapConfig, Runtime};
pub use engine::{DataSource, ReportEngine};
pub use error::{BootstrapError, EngineError, GenerateError};
pub use generate::{GeneratedReport, GeneratorOptions, ReportGenerator};
pub use jvm::JvmEngine;
pub use request::{Locale, ParameterValue, ReportRequest, REPORT_LOCALE};
pub use settings::Settings;

#[cfg(feature = "server")]
pub use generate::generate_report;
