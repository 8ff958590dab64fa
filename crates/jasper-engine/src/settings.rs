//! Settings document: registered reports, drivers and connections
//!
//! The document is read once at startup and shared read-only afterwards.
//! Relative paths inside it resolve against the directory holding the file.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::SettingsError;

/// A registered report template
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportEntry {
    /// Path to the `.jrxml` source
    pub jrxml: PathBuf,
}

/// A JDBC driver archive and the class that registers it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriverEntry {
    /// Path to the driver jar
    pub path: PathBuf,
    /// Fully qualified driver class, e.g. `org.postgresql.Driver`
    #[serde(rename = "class")]
    pub class_name: String,
}

/// A named JDBC connection
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionEntry {
    pub jdbc: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for ConnectionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEntry")
            .field("jdbc", &self.jdbc)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The parsed settings document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub reports: BTreeMap<String, ReportEntry>,
    #[serde(default)]
    pub drivers: BTreeMap<String, DriverEntry>,
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Settings {
    /// Read and validate the settings file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let settings = Self::from_json(&raw, base_dir)?;

        info!(
            "Loaded settings from {}: {} reports, {} drivers, {} connections",
            path.display(),
            settings.reports.len(),
            settings.drivers.len(),
            settings.connections.len()
        );

        Ok(settings)
    }

    /// Parse a settings document whose relative paths resolve against `base_dir`
    pub fn from_json(raw: &str, base_dir: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let mut settings: Settings = serde_json::from_str(raw)?;
        settings.base_dir = base_dir.into();
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        for (name, report) in &self.reports {
            if report.jrxml.as_os_str().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "report '{}' has an empty jrxml path",
                    name
                )));
            }
        }

        for (name, driver) in &self.drivers {
            if driver.path.as_os_str().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "driver '{}' has an empty archive path",
                    name
                )));
            }
            if driver.class_name.trim().is_empty() {
                return Err(SettingsError::Invalid(format!(
                    "driver '{}' has no class",
                    name
                )));
            }
        }

        for (name, conn) in &self.connections {
            if !conn.jdbc.starts_with("jdbc:") {
                warn!(
                    "Connection '{}' does not use a jdbc: URL; opening it will likely fail",
                    name
                );
            }
        }

        Ok(())
    }

    /// Directory that relative paths resolve against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a path from the document against the base directory
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolved template path of a registered report
    pub fn report_template(&self, name: &str) -> Option<PathBuf> {
        self.reports
            .get(name)
            .map(|report| self.resolve_path(&report.jrxml))
    }

    pub fn connection(&self, name: &str) -> Option<&ConnectionEntry> {
        self.connections.get(name)
    }

    pub fn report_names(&self) -> impl Iterator<Item = &str> {
        self.reports.keys().map(String::as_str)
    }

    pub fn connection_names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}
