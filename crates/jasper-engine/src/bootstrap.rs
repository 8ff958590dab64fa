//! Startup sequence: settings → classpath → drivers → JVM
//!
//! Runs once, synchronously, before the HTTP listener binds. Every step
//! depends on the previous one; a failure in any fatal step aborts startup.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::classpath::Classpath;
use crate::drivers::{register_drivers, stage_drivers, DriverReport, StagedDriver};
use crate::error::BootstrapError;
use crate::jvm::JvmEngine;
use crate::settings::Settings;

/// Inputs to the startup sequence
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub settings_path: PathBuf,
    pub lib_dir: PathBuf,
    /// Extra JVM options such as `-Xmx512m`
    pub jvm_options: Vec<String>,
}

/// Everything known before the JVM starts
#[derive(Debug)]
pub struct Prepared {
    pub settings: Settings,
    pub classpath: Classpath,
    pub drivers: Vec<StagedDriver>,
}

/// A started runtime, ready to serve requests
pub struct Runtime {
    pub settings: Arc<Settings>,
    pub engine: Arc<JvmEngine>,
    /// Drivers that registered, and those that could not be loaded
    pub drivers: DriverReport,
}

/// Load settings, scan the library directory and stage driver archives
pub fn prepare(config: &BootstrapConfig) -> Result<Prepared, BootstrapError> {
    info!("Step 1/4: loading settings");
    let settings = Settings::load(&config.settings_path)?;

    info!("Step 2/4: collecting jars");
    let mut classpath = Classpath::scan_library_dir(&config.lib_dir)?;

    info!("Step 3/4: staging SQL drivers");
    let drivers = stage_drivers(&settings, &mut classpath);

    Ok(Prepared {
        settings,
        classpath,
        drivers,
    })
}

/// Run the full startup sequence
pub fn bootstrap(config: &BootstrapConfig) -> Result<Runtime, BootstrapError> {
    let Prepared {
        settings,
        classpath,
        drivers,
    } = prepare(config)?;

    info!("Step 4/4: starting JVM and importing JasperReports");
    let engine = JvmEngine::start(&classpath, &config.jvm_options)?;
    let drivers = register_drivers(&engine, &drivers);

    info!(
        "Bootstrap complete: {} drivers registered, {} unusable",
        drivers.registered.len(),
        drivers.failed.len()
    );

    Ok(Runtime {
        settings: Arc::new(settings),
        engine: Arc::new(engine),
        drivers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClasspathError, SettingsError};
    use pretty_assertions::assert_eq;

    fn config(dir: &std::path::Path) -> BootstrapConfig {
        BootstrapConfig {
            settings_path: dir.join("settings.json"),
            lib_dir: dir.join("libs"),
            jvm_options: Vec::new(),
        }
    }

    #[test]
    fn prepare_collects_library_and_driver_jars() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("libs")).unwrap();
        std::fs::create_dir_all(dir.path().join("drivers")).unwrap();
        std::fs::write(dir.path().join("libs/jasperreports.jar"), b"").unwrap();
        std::fs::write(dir.path().join("drivers/h2.jar"), b"").unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{ "drivers": { "h2": { "path": "drivers/h2.jar", "class": "org.h2.Driver" } } }"#,
        )
        .unwrap();

        let prepared = prepare(&config(dir.path())).unwrap();

        assert_eq!(
            prepared.classpath.entries(),
            &[
                dir.path().join("libs/jasperreports.jar"),
                dir.path().join("drivers/h2.jar"),
            ]
        );
        assert_eq!(prepared.drivers.len(), 1);
        assert_eq!(prepared.drivers[0].class_name, "org.h2.Driver");
    }

    #[test]
    fn missing_settings_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = prepare(&config(dir.path())).unwrap_err();
        assert!(matches!(err, BootstrapError::Settings(SettingsError::Read { .. })));
    }

    #[test]
    fn malformed_settings_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "reports:").unwrap();
        let err = prepare(&config(dir.path())).unwrap_err();
        assert!(matches!(err, BootstrapError::Settings(SettingsError::Parse(_))));
    }

    #[test]
    fn missing_library_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{}").unwrap();
        let err = prepare(&config(dir.path())).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Classpath(ClasspathError::LibraryDir { .. })
        ));
    }
}
