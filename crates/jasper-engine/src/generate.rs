//! Report generation: compile → fill → export
//!
//! Scratch files live in a per-request temporary directory that is removed
//! when the request finishes, whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::engine::{DataSource, ReportEngine};
use crate::error::{EngineError, GenerateError};
use crate::request::ReportRequest;
use crate::settings::Settings;

const ARTIFACT_FILE: &str = "report.jasper";
const PDF_FILE: &str = "report.pdf";

/// Behavior switches for [`ReportGenerator`]
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneratorOptions {
    /// Reject unregistered connection names instead of rendering without data
    pub strict_connections: bool,
}

/// A rendered report
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub pdf: Vec<u8>,
    pub page_count: usize,
    pub template: PathBuf,
}

/// Runs requests against a [`ReportEngine`] using the registered settings
pub struct ReportGenerator<E> {
    engine: Arc<E>,
    settings: Arc<Settings>,
    options: GeneratorOptions,
}

impl<E: ReportEngine> ReportGenerator<E> {
    pub fn new(engine: Arc<E>, settings: Arc<Settings>, options: GeneratorOptions) -> Self {
        Self {
            engine,
            settings,
            options,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Pick the data source for a request.
    ///
    /// No connection, or an unregistered one, yields [`DataSource::Empty`]
    /// unless strict mode is on.
    pub fn resolve_data_source(&self, request: &ReportRequest) -> Result<DataSource, GenerateError> {
        let Some(name) = request.connection.as_deref() else {
            debug!("No connection requested, using empty data source");
            return Ok(DataSource::Empty);
        };

        match self.settings.connection(name) {
            Some(descriptor) => Ok(DataSource::Connection {
                name: name.to_string(),
                descriptor: descriptor.clone(),
            }),
            None if self.options.strict_connections => {
                Err(GenerateError::UnknownConnection(name.to_string()))
            }
            None => {
                warn!(
                    "Connection {} is not registered, using empty data source",
                    name
                );
                Ok(DataSource::Empty)
            }
        }
    }

    /// Generate a PDF. Blocks for the whole engine call chain.
    pub fn generate(&self, request: &ReportRequest) -> Result<GeneratedReport, GenerateError> {
        let template = request.resolve_template(&self.settings)?;
        if !template.is_file() {
            return Err(GenerateError::TemplateNotFound(template));
        }
        let parameters = request.report_parameters()?;
        let source = self.resolve_data_source(request)?;

        let scratch = tempfile::Builder::new().prefix("jasper-").tempdir()?;
        let artifact = scratch.path().join(ARTIFACT_FILE);
        let output = scratch.path().join(PDF_FILE);

        info!("Compiling {}", template.display());
        self.engine.compile(&template, &artifact)?;

        debug!(
            "Filling with {} parameters from {:?}",
            parameters.len(),
            source
        );
        let filled = self.engine.fill(&artifact, &parameters, &source)?;

        self.engine.export_pdf(&filled, &output)?;
        drop(filled);

        let pdf = std::fs::read(&output)?;
        let page_count = count_pages(&pdf)?;

        info!(
            "Generated {} ({} bytes, {} pages)",
            template.display(),
            pdf.len(),
            page_count
        );

        scratch.close()?;

        Ok(GeneratedReport {
            pdf,
            page_count,
            template,
        })
    }
}

/// Parse the exported bytes and count pages
pub fn count_pages(pdf: &[u8]) -> Result<usize, EngineError> {
    if pdf.is_empty() {
        return Err(EngineError::Output("exported PDF is empty".into()));
    }
    let doc = lopdf::Document::load_mem(pdf)
        .map_err(|e| EngineError::Output(format!("exported file is not a PDF: {}", e)))?;
    Ok(doc.get_pages().len())
}

/// Generate on the blocking pool with an upper bound on wall time.
///
/// On timeout the native call keeps running in the background; its scratch
/// directory and connection are still released when it returns.
#[cfg(feature = "server")]
pub async fn generate_report<E: ReportEngine>(
    generator: Arc<ReportGenerator<E>>,
    request: ReportRequest,
    timeout_ms: u64,
) -> Result<GeneratedReport, GenerateError> {
    use std::time::Duration;

    let task = tokio::task::spawn_blocking(move || generator.generate(&request));

    match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(GenerateError::Internal(format!(
            "Report task panicked: {}",
            join_error
        ))),
        Err(_elapsed) => Err(GenerateError::Timeout(timeout_ms)),
    }
}
