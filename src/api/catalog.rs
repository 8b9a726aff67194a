//! AV, e-book and e-journal list endpoints
//!
//! One router serves all three catalogs; the [`ListKind`] arrives as a
//! request extension set where the router is nested.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::subscriptions::{
    filter_by_languages, merge_unique, parse_languages, LanguageCounts,
};
use crate::service;
use crate::types::{CatalogEntry, Language, ListKind};

use super::auth::{Role, Session};
use super::error::ApiError;
use super::handlers::ApiResponse;
use super::server::AppState;

/// Routes for one catalog, mounted at `/api/<kind>`
pub fn routes(kind: ListKind) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_entries))
        .route("/create", post(create_entry))
        .route("/update", post(update_entry))
        .route("/:id", delete(delete_entry))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscriptions", get(list_subscriptions))
        .layer(Extension(kind))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub year: Option<i32>,
    pub library_id: Option<u32>,
    /// Comma-separated codes or ids, e.g. `CHN,KOR`
    pub languages: Option<String>,
}

/// Create/update body; the list kind comes from the route
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    #[serde(default)]
    pub id: Option<u32>,
    pub title: String,
    #[serde(default)]
    pub cjk_title: Option<String>,
    #[serde(default)]
    pub romanized_title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default = "one")]
    pub title_count: f64,
    #[serde(default)]
    pub volume_count: Option<f64>,
    #[serde(default)]
    pub is_global: bool,
    #[serde(default)]
    pub library_id: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

fn one() -> f64 {
    1.0
}

impl EntryRequest {
    fn into_entry(self, kind: ListKind) -> CatalogEntry {
        CatalogEntry {
            id: self.id.unwrap_or_default(),
            kind,
            title: self.title.trim().to_string(),
            cjk_title: self.cjk_title,
            romanized_title: self.romanized_title,
            subtitle: self.subtitle,
            publisher: self.publisher,
            description: self.description,
            notes: self.notes,
            languages: self.languages,
            title_count: self.title_count,
            volume_count: self.volume_count,
            is_global: self.is_global,
            library_id: self.library_id,
            year: self.year,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    pub library_year_id: u32,
    pub entry_id: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResult {
    pub changed: bool,
    pub subscribed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionsQuery {
    pub library_year_id: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribedList {
    pub entries: Vec<CatalogEntry>,
    pub counts: LanguageCounts,
}

fn manages_every_list(session: &Session) -> bool {
    session.has_any(&[Role::SuperAdmin, Role::EResourceEditor])
}

/// Whether the caller may see `entry` at all
fn can_view(session: &Session, entry: &CatalogEntry) -> bool {
    manages_every_list(session)
        || entry.is_global
        || (entry.library_id.is_some() && entry.library_id == session.library_id)
}

/// Role 1/3 manage any record; role-2-only users their library's own records
fn authorize_write(session: &Session, entry: &CatalogEntry) -> Result<(), ApiError> {
    if manages_every_list(session) {
        return Ok(());
    }
    if !session.has_role(Role::Member) {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }
    if entry.is_global {
        return Err(ApiError::forbidden(
            "Members may only manage their library's own records",
        ));
    }
    match (entry.library_id, session.library_id) {
        (Some(owner), Some(own)) if owner == own => Ok(()),
        _ => Err(ApiError::forbidden(
            "Members may only manage their library's own records",
        )),
    }
}

/// GET /api/<kind>
pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<CatalogEntry>>>, ApiError> {
    let languages = parse_languages(query.languages.as_deref().unwrap_or(""))?;

    let visible: Vec<CatalogEntry> = state
        .store
        .catalog(kind)
        .into_iter()
        .filter(|e| can_view(&session, e))
        .filter(|e| query.year.map_or(true, |y| e.year.map_or(true, |ey| ey == y)))
        .filter(|e| {
            query
                .library_id
                .map_or(true, |id| e.is_global || e.library_id == Some(id))
        })
        .collect();

    // One batch per selected language, merged in selection order
    let entries = if languages.is_empty() {
        visible
    } else {
        merge_unique(
            languages
                .iter()
                .map(|language| filter_by_languages(&visible, std::slice::from_ref(language))),
        )
    };

    Ok(Json(ApiResponse::ok(entries)))
}

/// POST /api/<kind>/create
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Json(request): Json<EntryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CatalogEntry>>), ApiError> {
    let mut entry = request.into_entry(kind);
    if session.is_member_only() && entry.library_id.is_none() {
        entry.library_id = session.library_id;
    }
    authorize_write(&session, &entry)?;

    let created = service::create_entry(state.store.as_ref(), entry)?;
    state.persist().await?;
    info!(user = %session.username, list = %kind, id = created.id, "entry created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// POST /api/<kind>/update
pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Json(request): Json<EntryRequest>,
) -> Result<Json<ApiResponse<CatalogEntry>>, ApiError> {
    let id = request
        .id
        .ok_or_else(|| ApiError::bad_request("Missing id"))?;
    let existing = state.store.catalog_entry(kind, id)?;
    authorize_write(&session, &existing)?;

    let mut entry = request.into_entry(kind);
    if entry.library_id.is_none() {
        entry.library_id = existing.library_id;
    }
    authorize_write(&session, &entry)?;

    let updated = service::update_entry(state.store.as_ref(), entry)?;
    state.persist().await?;
    info!(user = %session.username, list = %kind, id, "entry updated");
    Ok(Json(ApiResponse::ok(updated)))
}

/// DELETE /api/<kind>/:id
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Path(id): Path<u32>,
) -> Result<Json<ApiResponse<u32>>, ApiError> {
    let existing = state.store.catalog_entry(kind, id)?;
    authorize_write(&session, &existing)?;

    service::delete_entry(state.store.as_ref(), kind, id)?;
    state.persist().await?;
    info!(user = %session.username, list = %kind, id, "entry deleted");
    Ok(Json(ApiResponse::ok(id)))
}

async fn toggle(
    state: &Arc<AppState>,
    kind: ListKind,
    session: &Session,
    request: SubscriptionRequest,
    subscribe: bool,
) -> Result<Json<ApiResponse<SubscriptionResult>>, ApiError> {
    let library_year = state.store.library_year_by_id(request.library_year_id)?;
    if !session.can_edit_library(library_year.library_id) {
        return Err(ApiError::forbidden("Not allowed to edit this library"));
    }
    let entry = state.store.catalog_entry(kind, request.entry_id)?;
    if !can_view(session, &entry) {
        return Err(ApiError::forbidden("Entry belongs to another library"));
    }

    let changed = service::toggle_subscription(
        state.store.as_ref(),
        kind,
        request.entry_id,
        request.library_year_id,
        subscribe,
    )?;
    if changed {
        state.persist().await?;
    }
    Ok(Json(ApiResponse::ok(SubscriptionResult {
        changed,
        subscribed: subscribe,
    })))
}

/// POST /api/<kind>/subscribe
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Json(request): Json<SubscriptionRequest>,
) -> Result<Json<ApiResponse<SubscriptionResult>>, ApiError> {
    toggle(&state, kind, &session, request, true).await
}

/// POST /api/<kind>/unsubscribe
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Json(request): Json<SubscriptionRequest>,
) -> Result<Json<ApiResponse<SubscriptionResult>>, ApiError> {
    toggle(&state, kind, &session, request, false).await
}

/// GET /api/<kind>/subscriptions?libraryYearId=N
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ListKind>,
    session: Session,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<ApiResponse<SubscribedList>>, ApiError> {
    let library_year = state.store.library_year_by_id(query.library_year_id)?;
    if !session.can_edit_library(library_year.library_id)
        && !session.has_role(Role::EResourceEditor)
    {
        return Err(ApiError::forbidden("Not allowed to view this library"));
    }

    let entries = state.store.subscribed_entries(kind, library_year.id);
    let counts = LanguageCounts::tally(&entries);
    Ok(Json(ApiResponse::ok(SubscribedList { entries, counts })))
}
