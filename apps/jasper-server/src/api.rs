//! API handlers for the Jasper server
//!
//! Provides REST endpoints for:
//! - PDF generation from registered or ad-hoc templates
//! - Registered report listing
//! - Health checks

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use jasper_engine::{generate_report, ReportEngine, ReportRequest};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::AppState;

/// Number of pages in the returned PDF
pub const PAGE_COUNT_HEADER: HeaderName = HeaderName::from_static("x-page-count");

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub drivers: DriverStatus,
}

/// Driver names by registration outcome; failure reasons stay in the log
#[derive(Serialize)]
pub struct DriverStatus {
    pub registered: Vec<String>,
    pub unusable: Vec<String>,
}

/// Handler: GET /health
///
/// Reports `degraded` when a configured driver could not be loaded.
pub async fn handle_health<E: ReportEngine>(
    State(state): State<AppState<E>>,
) -> Json<HealthResponse> {
    let unusable: Vec<String> = state
        .drivers
        .failed
        .iter()
        .map(|(name, _)| name.clone())
        .collect();

    Json(HealthResponse {
        status: if unusable.is_empty() { "healthy" } else { "degraded" },
        service: "jasper-server",
        version: env!("CARGO_PKG_VERSION"),
        drivers: DriverStatus {
            registered: state.drivers.registered.clone(),
            unusable,
        },
    })
}

/// Registered names; connection credentials are never listed
#[derive(Serialize)]
pub struct ReportListResponse {
    pub success: bool,
    pub reports: Vec<String>,
    pub connections: Vec<String>,
    pub count: usize,
}

/// Handler: GET /reports
pub async fn handle_list_reports<E: ReportEngine>(
    State(state): State<AppState<E>>,
) -> Json<ReportListResponse> {
    let settings = state.generator.settings();
    let reports: Vec<String> = settings.report_names().map(str::to_string).collect();
    let connections = settings.connection_names().map(str::to_string).collect();

    Json(ReportListResponse {
        success: true,
        count: reports.len(),
        reports,
        connections,
    })
}

/// Handler: POST /generate_pdf
pub async fn handle_generate_pdf<E: ReportEngine>(
    State(state): State<AppState<E>>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected generate request: {}", rejection.body_text());
        ServerError::InvalidParameters(rejection.body_text())
    })?;

    info!(
        "Generate request: name={:?}, jrxml={:?}, connection={:?}",
        request.name, request.jrxml, request.connection
    );
    debug!("Parameters: {:?}", request.parameters);

    let report = generate_report(state.generator.clone(), request, state.timeout_ms).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (PAGE_COUNT_HEADER, HeaderValue::from(report.page_count)),
        ],
        Bytes::from(report.pdf),
    )
        .into_response())
}
