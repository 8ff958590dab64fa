//! Error types for bootstrap and report generation

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading the settings document
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Errors raised while assembling the JVM classpath
#[derive(Error, Debug)]
pub enum ClasspathError {
    #[error("Library directory {path} is not readable: {source}")]
    LibraryDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Classpath entry cannot be joined: {0}")]
    InvalidEntry(String),
}

/// Failures reported by a [`crate::ReportEngine`] implementation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("JVM failed to start: {0}")]
    Startup(String),

    #[error("Class not available: {0}")]
    ClassNotFound(String),

    /// A Java exception, carrying the throwable's `toString()`
    #[error("Java exception: {0}")]
    Java(String),

    #[error("JNI error: {0}")]
    Jni(String),

    #[error("Engine produced no usable output: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<jni::errors::Error> for EngineError {
    fn from(err: jni::errors::Error) -> Self {
        EngineError::Jni(err.to_string())
    }
}

/// Errors from a single report generation request
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Report '{0}' is not registered")]
    ReportNotFound(String),

    #[error("Request names neither a registered report nor a jrxml template")]
    MissingTemplate,

    #[error("Template file does not exist: {0}")]
    TemplateNotFound(PathBuf),

    #[error("Connection '{0}' is not registered")]
    UnknownConnection(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Report generation timed out after {0}ms")]
    Timeout(u64),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal startup errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Classpath(#[from] ClasspathError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
