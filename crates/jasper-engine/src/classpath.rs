//! JVM classpath assembly
//!
//! The embedded JVM receives its classpath once, at creation time, so every
//! archive (library directory plus driver jars) is collected here first.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ClasspathError;

/// Archive extensions accepted on the classpath
const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip"];

/// True if `path` has a recognized archive extension
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

/// Ordered, de-duplicated list of classpath archives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every archive directly inside `dir`, skipping subdirectories
    pub fn scan_library_dir(dir: &Path) -> Result<Self, ClasspathError> {
        info!("Scanning {} for jars", dir.display());

        let read_err = |source| ClasspathError::LibraryDir {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            if path.is_dir() {
                debug!("Skipping subdirectory {}", path.display());
                continue;
            }
            files.push(path);
        }
        files.sort();

        let mut classpath = Self::new();
        for file in files {
            if !classpath.push(&file) {
                debug!("Ignoring non-archive {}", file.display());
            }
        }

        info!("Found {} archives in {}", classpath.len(), dir.display());
        Ok(classpath)
    }

    /// Append an archive; returns false for non-archives and duplicates
    pub fn push(&mut self, path: &Path) -> bool {
        if !is_archive(path) || self.entries.iter().any(|e| e == path) {
            return false;
        }
        debug!("Loading: {}", path.display());
        self.entries.push(path.to_path_buf());
        true
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a `-Djava.class.path=...` JVM option
    pub fn to_jvm_option(&self) -> Result<String, ClasspathError> {
        let joined = std::env::join_paths(&self.entries)
            .map_err(|e| ClasspathError::InvalidEntry(e.to_string()))?;
        let joined = joined.into_string().map_err(|raw| {
            ClasspathError::InvalidEntry(format!("non UTF-8 path: {}", raw.to_string_lossy()))
        })?;
        Ok(format!("-Djava.class.path={}", joined))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn recognizes_archives_case_insensitively() {
        assert!(is_archive(Path::new("libs/jasperreports.jar")));
        assert!(is_archive(Path::new("libs/LEGACY.JAR")));
        assert!(is_archive(Path::new("libs/fonts.zip")));
        assert!(!is_archive(Path::new("libs/readme.txt")));
        assert!(!is_archive(Path::new("libs/jar")));
    }

    #[test]
    fn scan_skips_subdirectories_and_non_archives() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jar"), b"").unwrap();
        std::fs::write(dir.path().join("a.jar"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.jar")).unwrap();
        std::fs::write(dir.path().join("nested.jar").join("c.jar"), b"").unwrap();

        let classpath = Classpath::scan_library_dir(dir.path()).unwrap();

        assert_eq!(
            classpath.entries(),
            &[dir.path().join("a.jar"), dir.path().join("b.jar")]
        );
    }

    #[test]
    fn scan_of_missing_dir_fails() {
        let err = Classpath::scan_library_dir(Path::new("/nonexistent/libs")).unwrap_err();
        assert!(matches!(err, ClasspathError::LibraryDir { .. }));
    }

    #[test]
    fn push_rejects_duplicates() {
        let mut classpath = Classpath::new();
        assert!(classpath.push(Path::new("/libs/a.jar")));
        assert!(!classpath.push(Path::new("/libs/a.jar")));
        assert!(!classpath.push(Path::new("/libs/a.class")));
        assert_eq!(classpath.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn jvm_option_joins_with_platform_separator() {
        let mut classpath = Classpath::new();
        classpath.push(Path::new("/libs/a.jar"));
        classpath.push(Path::new("/drivers/pg.jar"));

        assert_eq!(
            classpath.to_jvm_option().unwrap(),
            "-Djava.class.path=/libs/a.jar:/drivers/pg.jar"
        );
    }
}
