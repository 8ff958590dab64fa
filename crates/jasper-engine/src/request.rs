//! Report generation request and parameter handling

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::GenerateError;
use crate::settings::Settings;

/// Parameter that JasperReports reads as a `java.util.Locale`
pub const REPORT_LOCALE: &str = "REPORT_LOCALE";

/// Body of `POST /generate_pdf`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    /// Registered report name
    pub name: Option<String>,
    /// Explicit template path, used when `name` is not registered
    pub jrxml: Option<PathBuf>,
    /// Registered connection name
    pub connection: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl ReportRequest {
    /// Resolve the template to compile.
    ///
    /// A registered `name` always wins over `jrxml`. A request `jrxml` must
    /// stay inside the settings base directory.
    pub fn resolve_template(&self, settings: &Settings) -> Result<PathBuf, GenerateError> {
        if let Some(path) = self.name.as_deref().and_then(|n| settings.report_template(n)) {
            return Ok(path);
        }

        match (&self.jrxml, &self.name) {
            (Some(jrxml), _) => {
                confine_to_base(jrxml)?;
                Ok(settings.base_dir().join(jrxml))
            }
            (None, Some(name)) => Err(GenerateError::ReportNotFound(name.clone())),
            (None, None) => Err(GenerateError::MissingTemplate),
        }
    }

    /// Convert the raw parameter map into typed report parameters
    pub fn report_parameters(&self) -> Result<ReportParameters, GenerateError> {
        let mut params = ReportParameters::default();
        for (name, raw) in &self.parameters {
            let value = if name == REPORT_LOCALE {
                let locale = Locale::parse(raw).ok_or_else(|| GenerateError::InvalidParameter {
                    name: name.clone(),
                    reason: format!("'{}' is not a language[_country] locale", raw),
                })?;
                ParameterValue::Locale(locale)
            } else {
                ParameterValue::Text(raw.clone())
            };
            params.insert(name.clone(), value);
        }
        Ok(params)
    }
}

/// Reject request paths that could leave the base directory
fn confine_to_base(path: &Path) -> Result<(), GenerateError> {
    let invalid = |reason: &str| GenerateError::InvalidParameter {
        name: "jrxml".to_string(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("path may not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative"))
            }
        }
    }
    Ok(())
}

/// A locale decomposed from `language[_country[_variant]]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub language: String,
    pub country: Option<String>,
    pub variant: Option<String>,
}

impl Locale {
    /// Parse an underscore or hyphen delimited locale string
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(['_', '-']);
        let language = parts.next().filter(|s| !s.is_empty())?.to_string();
        let country = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let variant = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        Some(Self {
            language,
            country,
            variant,
        })
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.language)?;
        if let Some(country) = &self.country {
            write!(f, "_{}", country)?;
        }
        if let Some(variant) = &self.variant {
            write!(f, "_{}", variant)?;
        }
        Ok(())
    }
}

/// Value of a single report parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterValue {
    Text(String),
    Locale(Locale),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(text) => f.write_str(text),
            ParameterValue::Locale(locale) => locale.fmt(f),
        }
    }
}

/// Named report parameters, ordered by name
pub type ReportParameters = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings::from_json(
            r#"{ "reports": { "invoice": { "jrxml": "invoice.jrxml" } } }"#,
            "/opt/jasper",
        )
        .unwrap()
    }

    #[test]
    fn registered_name_resolves_to_registry_path() {
        let request = ReportRequest {
            name: Some("invoice".into()),
            ..Default::default()
        };
        assert_eq!(
            request.resolve_template(&settings()).unwrap(),
            PathBuf::from("/opt/jasper/invoice.jrxml")
        );
    }

    #[test]
    fn registry_wins_over_explicit_jrxml() {
        let request = ReportRequest {
            name: Some("invoice".into()),
            jrxml: Some("other.jrxml".into()),
            ..Default::default()
        };
        assert_eq!(
            request.resolve_template(&settings()).unwrap(),
            PathBuf::from("/opt/jasper/invoice.jrxml")
        );
    }

    #[test]
    fn unregistered_name_falls_back_to_jrxml() {
        let request = ReportRequest {
            name: Some("adhoc".into()),
            jrxml: Some("adhoc.jrxml".into()),
            ..Default::default()
        };
        assert_eq!(
            request.resolve_template(&settings()).unwrap(),
            PathBuf::from("/opt/jasper/adhoc.jrxml")
        );
    }

    #[test]
    fn unregistered_name_without_jrxml_is_not_found() {
        let request = ReportRequest {
            name: Some("missing".into()),
            ..Default::default()
        };
        let err = request.resolve_template(&settings()).unwrap_err();
        assert!(matches!(err, GenerateError::ReportNotFound(name) if name == "missing"));
    }

    #[test]
    fn empty_request_has_no_template() {
        let err = ReportRequest::default()
            .resolve_template(&settings())
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingTemplate));
    }

    #[test]
    fn absolute_jrxml_is_rejected() {
        let request = ReportRequest {
            jrxml: Some("/etc/passwd".into()),
            ..Default::default()
        };
        let err = request.resolve_template(&settings()).unwrap_err();
        assert!(matches!(err, GenerateError::InvalidParameter { name, .. } if name == "jrxml"));
    }

    #[test]
    fn parent_segments_in_jrxml_are_rejected() {
        for raw in ["../x.jrxml", "reports/../../etc/passwd", "a/b/.."] {
            let request = ReportRequest {
                jrxml: Some(raw.into()),
                ..Default::default()
            };
            let err = request.resolve_template(&settings()).unwrap_err();
            assert!(
                matches!(err, GenerateError::InvalidParameter { .. }),
                "{} should be rejected",
                raw
            );
        }
    }

    #[test]
    fn nested_relative_jrxml_stays_under_base() {
        let request = ReportRequest {
            jrxml: Some("./reports/adhoc.jrxml".into()),
            ..Default::default()
        };
        let path = request.resolve_template(&settings()).unwrap();
        assert!(path.starts_with("/opt/jasper"));
        assert!(path.ends_with("reports/adhoc.jrxml"));
    }

    #[test]
    fn registered_name_ignores_unsafe_jrxml() {
        let request = ReportRequest {
            name: Some("invoice".into()),
            jrxml: Some("/etc/passwd".into()),
            ..Default::default()
        };
        assert_eq!(
            request.resolve_template(&settings()).unwrap(),
            PathBuf::from("/opt/jasper/invoice.jrxml")
        );
    }

    #[test]
    fn locale_with_country() {
        assert_eq!(
            Locale::parse("en_US"),
            Some(Locale {
                language: "en".into(),
                country: Some("US".into()),
                variant: None,
            })
        );
        assert_eq!(Locale::parse("pt-BR").unwrap().country.as_deref(), Some("BR"));
    }

    #[test]
    fn locale_language_only() {
        let locale = Locale::parse("en").unwrap();
        assert_eq!(locale.language, "en");
        assert_eq!(locale.country, None);
    }

    #[test]
    fn locale_with_variant_round_trips_display() {
        let locale = Locale::parse("no_NO_NY").unwrap();
        assert_eq!(locale.variant.as_deref(), Some("NY"));
        assert_eq!(locale.to_string(), "no_NO_NY");
    }

    #[test]
    fn empty_locale_is_rejected() {
        assert_eq!(Locale::parse(""), None);
        assert_eq!(Locale::parse("_US"), None);
    }

    #[test]
    fn report_locale_parameter_is_typed() {
        let request: ReportRequest = serde_json::from_str(
            r#"{ "name": "invoice", "parameters": { "REPORT_LOCALE": "de_DE", "TITLE": "Q3" } }"#,
        )
        .unwrap();

        let params = request.report_parameters().unwrap();
        assert_eq!(params["TITLE"], ParameterValue::Text("Q3".into()));
        assert!(matches!(
            &params[REPORT_LOCALE],
            ParameterValue::Locale(l) if l.language == "de" && l.country.as_deref() == Some("DE")
        ));
    }

    #[test]
    fn invalid_report_locale_is_rejected() {
        let mut request = ReportRequest::default();
        request
            .parameters
            .insert(REPORT_LOCALE.to_string(), "-".to_string());

        let err = request.report_parameters().unwrap_err();
        assert!(matches!(err, GenerateError::InvalidParameter { name, .. } if name == REPORT_LOCALE));
    }
}
