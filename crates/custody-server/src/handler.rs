use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Json;
use custody_ledger::{
    CustodyTrail, HistoryEvent, LedgerReader, LedgerWriter, Package, ProjectionBuilder,
};
use custody_types::{Identity, PackageId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Package identifier as sent by clients: text or a JSON number.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPackageId {
    Text(String),
    Number(u64),
}

impl TryFrom<RawPackageId> for PackageId {
    type Error = custody_types::TypeError;

    fn try_from(raw: RawPackageId) -> Result<Self, Self::Error> {
        match raw {
            RawPackageId::Text(text) => PackageId::new(text),
            RawPackageId::Number(n) => Ok(PackageId::from(n)),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreatePackageRequest {
    pub id: RawPackageId,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub location: String,
}

/// History event with the timestamp rendered as a decimal string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    pub status: String,
    pub location: String,
    pub timestamp: String,
}

impl From<HistoryEvent> for EventView {
    fn from(event: HistoryEvent) -> Self {
        Self {
            status: event.status,
            location: event.location,
            timestamp: event.timestamp.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub id: PackageId,
    pub history: Vec<EventView>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LastStatusResponse {
    pub id: PackageId,
    #[serde(flatten)]
    pub event: EventView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    pub owner: Identity,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreatedResponse {
    pub message: &'static str,
    pub package: Package,
}

#[derive(Clone, Debug, Serialize)]
pub struct UpdatedResponse {
    pub message: &'static str,
    pub event: EventView,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrackingResponse {
    pub id: PackageId,
    pub origin: String,
    pub destination: String,
    pub status: String,
    pub location: String,
    pub event_count: u64,
    pub created_at: String,
    pub updated_at: String,
    pub at_destination: bool,
}

/// Health check handler.
pub async fn health_handler(State(state): State<AppState>) -> ServerResult<Json<Value>> {
    let packages = state.ledger.package_count()?;
    Ok(Json(json!({ "status": "ok", "packages": packages })))
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "custody-server",
        "version": env!("CARGO_PKG_VERSION"),
        "owner": state.ledger.owner(),
    }))
}

pub async fn owner_handler(State(state): State<AppState>) -> Json<OwnerResponse> {
    Json(OwnerResponse {
        owner: state.ledger.owner(),
    })
}

pub async fn get_package(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<Package>> {
    let id = PackageId::new(id)?;
    Ok(Json(state.ledger.get(&id)?))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<HistoryResponse>> {
    let id = PackageId::new(id)?;
    let history = state.ledger.history(&id)?;
    Ok(Json(HistoryResponse {
        id,
        history: history.into_iter().map(EventView::from).collect(),
    }))
}

pub async fn get_last_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<LastStatusResponse>> {
    let id = PackageId::new(id)?;
    let event = state.ledger.last_status(&id)?;
    Ok(Json(LastStatusResponse {
        id,
        event: event.into(),
    }))
}

pub async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<TrackingResponse>> {
    let id = PackageId::new(id)?;
    let tracking = ProjectionBuilder::tracking(state.ledger.as_ref(), &id)?;
    Ok(Json(TrackingResponse {
        id: tracking.package.id,
        origin: tracking.package.origin,
        destination: tracking.package.destination,
        status: tracking.last.status,
        location: tracking.last.location,
        event_count: tracking.event_count,
        created_at: tracking.created_at.to_string(),
        updated_at: tracking.updated_at.to_string(),
        at_destination: tracking.at_destination,
    }))
}

pub async fn get_trail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ServerResult<Json<CustodyTrail>> {
    let id = PackageId::new(id)?;
    Ok(Json(ProjectionBuilder::custody_trail(
        state.ledger.as_ref(),
        &id,
    )?))
}

pub async fn create_package(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreatePackageRequest>,
) -> ServerResult<Json<CreatedResponse>> {
    let caller = state.writer(&headers).await?;
    let id = PackageId::try_from(request.id)?;
    info!(
        package = %id,
        origin = %request.origin,
        destination = %request.destination,
        caller = %caller.short_id(),
        "create requested"
    );

    let package = state
        .ledger
        .create(&caller, &id, &request.origin, &request.destination)?;
    Ok(Json(CreatedResponse {
        message: "Package created successfully",
        package,
    }))
}

pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ServerResult<Json<UpdatedResponse>> {
    if request.status.trim().is_empty() || request.location.trim().is_empty() {
        return Err(ServerError::BadRequest(
            "Status and location are required.".into(),
        ));
    }
    let caller = state.writer(&headers).await?;
    let id = PackageId::new(id)?;
    info!(
        package = %id,
        status = %request.status,
        location = %request.location,
        caller = %caller.short_id(),
        "status update requested"
    );

    let event = state
        .ledger
        .update_status(&caller, &id, &request.status, &request.location)?;
    Ok(Json(UpdatedResponse {
        message: "Package status updated",
        event: event.into(),
    }))
}
