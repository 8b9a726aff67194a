//! API request handlers
//!
//! Info endpoints, the year-end export, per-form editing and library
//! administration. Catalog list endpoints live in [`super::catalog`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::excel::YearEndExporter;
use crate::service::{self, FormSubmission, FormView};
use crate::types::{ExportSelection, FormType, Library, LibraryYear};

use super::auth::{Role, Session};
use super::error::ApiError;
use super::server::AppState;

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Standard API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            request_id: Uuid::new_v4().to_string(),
            data: Some(data),
        }
    }
}

/// Root endpoint response
#[derive(Serialize)]
pub struct RootResponse {
    pub name: String,
    pub version: String,
    pub description: String,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Serialize)]
pub struct EndpointInfo {
    pub path: String,
    pub method: String,
    pub description: String,
}

fn endpoint(method: &str, path: &str, description: &str) -> EndpointInfo {
    EndpointInfo {
        path: path.to_string(),
        method: method.to_string(),
        description: description.to_string(),
    }
}

/// GET / - Root info
pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = RootResponse {
        name: "CEAL Statistics API".to_string(),
        version: state.version.clone(),
        description: "Annual East Asian library statistics survey".to_string(),
        endpoints: vec![
            endpoint("GET", "/health", "Health check endpoint"),
            endpoint("GET", "/version", "Get server version"),
            endpoint(
                "GET",
                "/api/export/year-end-reports",
                "Download the year-end workbook (?year=&formType=)",
            ),
            endpoint("GET", "/api/forms/:formType", "Load a form or its prefill"),
            endpoint("POST", "/api/forms/:formType", "Save or submit a form"),
            endpoint("GET", "/api/{av,ebook,ejournal}", "List catalog entries"),
            endpoint("POST", "/api/{av,ebook,ejournal}/create", "Create a catalog entry"),
            endpoint("POST", "/api/{av,ebook,ejournal}/update", "Update a catalog entry"),
            endpoint("DELETE", "/api/{av,ebook,ejournal}/:id", "Delete a catalog entry"),
            endpoint(
                "POST",
                "/api/{av,ebook,ejournal}/subscribe",
                "Add an entry to a library-year's list",
            ),
            endpoint(
                "POST",
                "/api/{av,ebook,ejournal}/unsubscribe",
                "Remove an entry from a library-year's list",
            ),
            endpoint("GET", "/api/libraries", "List participating libraries"),
            endpoint("POST", "/api/libraries", "Register a library"),
            endpoint("GET", "/api/library-years", "Survey status for a year"),
            endpoint("POST", "/api/library-years", "Open or close a library-year"),
        ],
    };
    Json(ApiResponse::ok(response))
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_message: String,
}

/// GET /health - Health check
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "healthy".to_string(),
        uptime_message: "Server is running".to_string(),
    }))
}

/// Version response
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub features: Vec<String>,
}

/// GET /version - Server version
pub async fn version(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::ok(VersionResponse {
        version: state.version.clone(),
        features: ["forms", "export", "av", "ebook", "ejournal"]
            .iter()
            .map(|f| f.to_string())
            .collect(),
    }))
}

//==============================================================================
// Export
//==============================================================================

/// Raw query so malformed values surface as JSON 400s
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub year: Option<String>,
    #[serde(rename = "formType")]
    pub form_type: Option<String>,
}

fn parse_year(raw: Option<&str>) -> Result<i32, ApiError> {
    let raw = raw
        .map(str::trim)
        .filter(|y| !y.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing year"))?;
    raw.parse()
        .map_err(|_| ApiError::bad_request("Invalid year").with_detail(raw.to_string()))
}

/// GET /api/export/year-end-reports - Year-end workbook download
pub async fn export_year_end_reports(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    session.require_any(&[Role::SuperAdmin, Role::EResourceEditor])?;

    let year = parse_year(query.year.as_deref())?;
    let selection: ExportSelection = query
        .form_type
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Missing formType"))?
        .parse()?;

    let records = state.store.year_records(year);
    let exporter = YearEndExporter::new(year, selection);
    let file_name = exporter.file_name();

    let bytes = tokio::task::spawn_blocking(move || exporter.render_to_bytes(&records))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "export task failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        })??;

    info!(
        user = %session.username,
        year,
        selection = selection.key(),
        bytes = bytes.len(),
        "year-end report exported"
    );

    let headers = [
        (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
        (
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];
    Ok((headers, bytes).into_response())
}

//==============================================================================
// Forms
//==============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormQuery {
    pub library_id: Option<u32>,
    pub year: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSaveRequest {
    pub library_id: Option<u32>,
    pub year: i32,
    #[serde(flatten)]
    pub submission: FormSubmission,
}

fn parse_form_type(raw: &str) -> Result<FormType, ApiError> {
    Ok(raw.parse()?)
}

/// Falls back to the caller's own library
fn target_library(session: &Session, requested: Option<u32>) -> Result<u32, ApiError> {
    requested
        .or(session.library_id)
        .ok_or_else(|| ApiError::bad_request("Missing libraryId"))
}

/// GET /api/forms/:formType - Stored entry or carry-forward prefill
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(form_type): Path<String>,
    Query(query): Query<FormQuery>,
) -> Result<Json<ApiResponse<FormView>>, ApiError> {
    let form = parse_form_type(&form_type)?;
    let library_id = target_library(&session, query.library_id)?;
    let year = parse_year(query.year.as_deref())?;

    if !session.can_edit_library(library_id) && !session.has_role(Role::EResourceEditor) {
        return Err(ApiError::forbidden("Not allowed to view this library"));
    }

    let view = service::form_view(state.store.as_ref(), library_id, year, form)?;
    Ok(Json(ApiResponse::ok(view)))
}

/// POST /api/forms/:formType - Save a draft or submit
pub async fn save_form(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(form_type): Path<String>,
    Json(request): Json<FormSaveRequest>,
) -> Result<Json<ApiResponse<LibraryYear>>, ApiError> {
    let form = parse_form_type(&form_type)?;
    let library_id = target_library(&session, request.library_id)?;

    if !session.can_edit_library(library_id) {
        return Err(ApiError::forbidden("Not allowed to edit this library"));
    }

    let library_year = state.store.library_year(library_id, request.year)?;
    if !library_year.is_open_for_editing && !session.has_role(Role::SuperAdmin) {
        return Err(ApiError::forbidden("This survey year is closed for editing"));
    }

    let saved = service::save_form(
        state.store.as_ref(),
        library_year.id,
        form,
        request.submission,
    )?;
    state.persist().await?;
    info!(user = %session.username, library_id, form = %form, "form stored");
    Ok(Json(ApiResponse::ok(saved)))
}

//==============================================================================
// Libraries
//==============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLibraryRequest {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenYearRequest {
    pub library_id: u32,
    pub year: i32,
    #[serde(default)]
    pub is_open_for_editing: Option<bool>,
}

/// Per-form progress of one library in a survey year
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryYearStatus {
    pub library_year_id: u32,
    pub library_id: u32,
    pub library_name: String,
    pub year: i32,
    pub is_open_for_editing: bool,
    pub saved_forms: Vec<FormType>,
    pub submitted_forms: Vec<FormType>,
}

#[derive(Debug, Deserialize)]
pub struct YearQuery {
    pub year: Option<String>,
}

/// GET /api/libraries
pub async fn list_libraries(
    State(state): State<Arc<AppState>>,
    _session: Session,
) -> Json<ApiResponse<Vec<Library>>> {
    Json(ApiResponse::ok(state.store.libraries()))
}

/// POST /api/libraries
pub async fn create_library(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<CreateLibraryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Library>>), ApiError> {
    session.require_any(&[Role::SuperAdmin])?;

    let library = state.store.create_library(&request.name, request.code)?;
    state.persist().await?;
    info!(user = %session.username, library_id = library.id, "library created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(library))))
}

/// GET /api/library-years?year=Y
pub async fn list_library_years(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<YearQuery>,
) -> Result<Json<ApiResponse<Vec<LibraryYearStatus>>>, ApiError> {
    session.require_any(&[Role::SuperAdmin, Role::EResourceEditor])?;
    let year = parse_year(query.year.as_deref())?;

    let statuses = state
        .store
        .year_records(year)
        .into_iter()
        .map(|record| {
            let ly = record.library_year;
            LibraryYearStatus {
                library_year_id: ly.id,
                library_id: record.library.id,
                library_name: record.library.name,
                year: ly.year,
                is_open_for_editing: ly.is_open_for_editing,
                saved_forms: ly.forms.keys().copied().collect(),
                submitted_forms: ly
                    .forms
                    .iter()
                    .filter(|(_, entry)| entry.submitted)
                    .map(|(form, _)| *form)
                    .collect(),
            }
        })
        .collect();
    Ok(Json(ApiResponse::ok(statuses)))
}

/// POST /api/library-years - Open a survey year for a library, or toggle editing
pub async fn open_library_year(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<OpenYearRequest>,
) -> Result<Json<ApiResponse<LibraryYear>>, ApiError> {
    session.require_any(&[Role::SuperAdmin])?;

    let (mut library_year, mut changed) = state
        .store
        .open_library_year(request.library_id, request.year)?;
    if let Some(open) = request.is_open_for_editing {
        if open != library_year.is_open_for_editing {
            library_year = state
                .store
                .update_library_year(library_year.id, &mut |row, _| {
                    row.is_open_for_editing = open;
                    Ok(())
                })?;
            changed = true;
        }
    }
    if !changed {
        return Ok(Json(ApiResponse::ok(library_year)));
    }

    state.persist().await?;
    info!(
        user = %session.username,
        library_id = request.library_id,
        year = request.year,
        open = library_year.is_open_for_editing,
        "library year opened"
    );
    Ok(Json(ApiResponse::ok(library_year)))
}
