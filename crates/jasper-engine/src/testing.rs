//! In-process [`ReportEngine`] for tests
//!
//! Compiles by copying the template, fills by collecting parameters and the
//! data source name, and exports a real single-page PDF with lopdf. Output is
//! deterministic for identical inputs.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

use crate::engine::{DataSource, ReportEngine};
use crate::error::EngineError;
use crate::request::{ParameterValue, ReportParameters};

/// Engine call that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubStage {
    Compile,
    Fill,
    Export,
}

#[derive(Default)]
struct StubState {
    artifacts: Vec<PathBuf>,
    opened: Vec<String>,
    open_now: usize,
    last_parameters: Vec<(String, String)>,
}

/// Filled stub report: the lines to print
pub struct StubFilled {
    lines: Vec<String>,
}

#[derive(Default)]
pub struct StubEngine {
    fail_at: Option<StubStage>,
    delay: Option<Duration>,
    state: Mutex<StubState>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_at(stage: StubStage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::default()
        }
    }

    /// Sleep this long in `compile`
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Artifact paths passed to `compile`, in call order
    pub fn artifact_paths(&self) -> Vec<PathBuf> {
        self.lock().artifacts.clone()
    }

    /// Connection names opened by `fill`, in call order
    pub fn opened_connections(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// Connections currently open
    pub fn open_connection_count(&self) -> usize {
        self.lock().open_now
    }

    /// Parameters of the last `fill`, locales rendered as `locale:<tag>`
    pub fn last_parameters(&self) -> Vec<(String, String)> {
        self.lock().last_parameters.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, stage: StubStage) -> Result<(), EngineError> {
        if self.fail_at == Some(stage) {
            return Err(EngineError::Java(format!(
                "net.sf.jasperreports.engine.JRException: stub {:?} failure",
                stage
            )));
        }
        Ok(())
    }
}

impl ReportEngine for StubEngine {
    type Filled = StubFilled;

    fn compile(&self, template: &Path, artifact: &Path) -> Result<(), EngineError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.lock().artifacts.push(artifact.to_path_buf());
        self.fail(StubStage::Compile)?;

        let source = std::fs::read(template)?;
        std::fs::write(artifact, source)?;
        Ok(())
    }

    fn fill(
        &self,
        artifact: &Path,
        parameters: &ReportParameters,
        source: &DataSource,
    ) -> Result<StubFilled, EngineError> {
        let compiled = std::fs::read_to_string(artifact)?;

        let rendered: Vec<(String, String)> = parameters
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    ParameterValue::Text(text) => text.clone(),
                    ParameterValue::Locale(locale) => format!("locale:{}", locale),
                };
                (name.clone(), value)
            })
            .collect();
        self.lock().last_parameters = rendered.clone();

        let source_line = match source {
            DataSource::Connection { name, .. } => {
                let mut state = self.lock();
                state.opened.push(name.clone());
                state.open_now += 1;
                format!("source: {}", name)
            }
            DataSource::Empty => "source: empty".to_string(),
        };

        let result = self.fail(StubStage::Fill);

        if let DataSource::Connection { .. } = source {
            self.lock().open_now -= 1;
        }
        result?;

        let mut lines = vec![compiled.trim().to_string(), source_line];
        lines.extend(
            rendered
                .into_iter()
                .map(|(name, value)| format!("{} = {}", name, value)),
        );
        Ok(StubFilled { lines })
    }

    fn export_pdf(&self, filled: &StubFilled, output: &Path) -> Result<(), EngineError> {
        self.fail(StubStage::Export)?;
        let bytes = render_pdf(&filled.lines).map_err(|e| EngineError::Output(e.to_string()))?;
        std::fs::write(output, bytes)?;
        Ok(())
    }
}

/// Single A4 page with one text line per entry
fn render_pdf(lines: &[String]) -> Result<Vec<u8>, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => Object::Reference(font_id) },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![50.into(), 780.into()]),
    ];
    for line in lines {
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.as_str())],
        ));
        operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
    }
    operations.push(Operation::new("ET", vec![]));

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
