//! SQL driver registration
//!
//! Driver archives have to be on the classpath before the JVM starts; the
//! driver classes can only be instantiated afterwards. Both halves live here.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::classpath::Classpath;
use crate::error::EngineError;
use crate::settings::Settings;

/// Loads and instantiates a driver class inside the running JVM
pub trait DriverLoader {
    fn load_driver(&self, class_name: &str) -> Result<(), EngineError>;
}

/// A configured driver whose archive has been staged on the classpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDriver {
    pub name: String,
    pub class_name: String,
    pub archive: PathBuf,
}

/// Outcome of driver registration
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub registered: Vec<String>,
    /// Driver name and the reason it is unusable
    pub failed: Vec<(String, String)>,
}

/// Add every configured driver archive to `classpath`.
///
/// Missing archives are logged; the driver is still staged so that a class
/// already present elsewhere on the classpath can be picked up.
pub fn stage_drivers(settings: &Settings, classpath: &mut Classpath) -> Vec<StagedDriver> {
    info!("Staging {} SQL drivers", settings.drivers.len());

    settings
        .drivers
        .iter()
        .map(|(name, driver)| {
            let archive = settings.resolve_path(&driver.path);
            if !archive.is_file() {
                warn!(
                    "Driver '{}' archive {} does not exist",
                    name,
                    archive.display()
                );
            } else if !classpath.push(&archive) {
                warn!(
                    "Driver '{}' archive {} is not a jar or already on the classpath",
                    name,
                    archive.display()
                );
            }

            StagedDriver {
                name: name.clone(),
                class_name: driver.class_name.clone(),
                archive,
            }
        })
        .collect()
}

/// Instantiate each staged driver class. Failures are logged and reported,
/// never fatal.
pub fn register_drivers<L: DriverLoader + ?Sized>(
    loader: &L,
    drivers: &[StagedDriver],
) -> DriverReport {
    let mut report = DriverReport::default();

    for driver in drivers {
        match loader.load_driver(&driver.class_name) {
            Ok(()) => {
                info!("Registered driver '{}' ({})", driver.name, driver.class_name);
                report.registered.push(driver.name.clone());
            }
            Err(err) => {
                error!(
                    "Driver '{}' ({}) could not be loaded: {}",
                    driver.name, driver.class_name, err
                );
                report.failed.push((driver.name.clone(), err.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct RecordingLoader {
        loaded: Mutex<Vec<String>>,
        broken: &'static str,
    }

    impl DriverLoader for RecordingLoader {
        fn load_driver(&self, class_name: &str) -> Result<(), EngineError> {
            if class_name == self.broken {
                return Err(EngineError::Java(format!(
                    "java.lang.ClassNotFoundException: {}",
                    class_name
                )));
            }
            self.loaded.lock().unwrap().push(class_name.to_string());
            Ok(())
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings::from_json(
            r#"{
                "drivers": {
                    "mysql": { "path": "drivers/mysql.jar", "class": "com.mysql.cj.jdbc.Driver" },
                    "postgres": { "path": "drivers/postgresql.jar", "class": "org.postgresql.Driver" }
                }
            }"#,
            dir,
        )
        .unwrap()
    }

    #[test]
    fn staging_adds_existing_archives_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("drivers")).unwrap();
        std::fs::write(dir.path().join("drivers/postgresql.jar"), b"").unwrap();

        let mut classpath = Classpath::new();
        let staged = stage_drivers(&settings_in(dir.path()), &mut classpath);

        assert_eq!(staged.len(), 2);
        assert_eq!(
            classpath.entries(),
            &[dir.path().join("drivers/postgresql.jar")]
        );
        assert_eq!(staged[1].class_name, "org.postgresql.Driver");
    }

    #[test]
    fn registration_reports_failures_without_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let mut classpath = Classpath::new();
        let staged = stage_drivers(&settings_in(dir.path()), &mut classpath);

        let loader = RecordingLoader {
            loaded: Mutex::new(Vec::new()),
            broken: "com.mysql.cj.jdbc.Driver",
        };
        let report = register_drivers(&loader, &staged);

        assert_eq!(report.registered, vec!["postgres".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "mysql");
        assert!(report.failed[0].1.contains("ClassNotFoundException"));
        assert_eq!(
            *loader.loaded.lock().unwrap(),
            vec!["org.postgresql.Driver".to_string()]
        );
    }
}
