use crate::errors::RegistryError;
use crate::manager::InventoryManager;
use crate::metrics::{REGISTERED_DEVICES, REST_ERRORS_TOTAL};
use crate::model::{Device, DeviceType, Location, LocationEntity, TelemetryReading};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
struct AppState {
    manager: Arc<InventoryManager>,
    prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    uuid: String,
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRequest {
    uuid: String,
    name: String,
    #[serde(default, rename = "type", alias = "device_type")]
    device_type: Option<String>,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    software_version: String,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

impl DeviceRequest {
    fn into_device(self, location_id: &str) -> Result<Device, RegistryError> {
        let device_type = self
            .device_type
            .filter(|t| !t.trim().is_empty())
            .map(DeviceType::new)
            .unwrap_or_default();

        Device::builder(self.uuid, self.name, location_id)
            .device_type(device_type)
            .manufacturer(self.manufacturer)
            .software_version(self.software_version)
            .position(self.latitude, self.longitude)
            .build()
    }
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    location_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "type")]
    device_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TelemetryResponse {
    device_id: String,
    registered: bool,
    data: Vec<TelemetryReading>,
    total: usize,
}

pub fn create_router(manager: Arc<InventoryManager>, api_prefix: &str) -> Router {
    let prefix = api_prefix.trim_end_matches('/').to_string();
    let state = AppState {
        manager,
        prefix: prefix.clone(),
    };

    let routes = Router::new()
        .route("/location", get(list_locations).post(create_location))
        .route(
            "/location/:location_id",
            get(get_location).put(update_location).delete(delete_location),
        )
        .route(
            "/location/:location_id/device",
            get(list_devices).post(create_device),
        )
        .route(
            "/location/:location_id/device/:device_id",
            get(get_device).put(update_device).delete(delete_device),
        )
        .route(
            "/location/:location_id/device/:device_id/location",
            put(move_device),
        )
        .route(
            "/location/:location_id/device/:device_id/telemetry",
            get(get_telemetry),
        )
        .with_state(state);

    if prefix.is_empty() {
        routes
    } else {
        Router::new().nest(&prefix, routes)
    }
}

/// Parses the body as JSON regardless of the request content type.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON ! Check the request: {}", e)))
}

fn created(location: String) -> Response {
    (StatusCode::CREATED, [(header::LOCATION, location)]).into_response()
}

fn refresh_device_gauge(manager: &InventoryManager) {
    REGISTERED_DEVICES.set(manager.stats().devices as f64);
}

async fn list_locations(State(state): State<AppState>) -> Json<Vec<LocationEntity>> {
    Json(state.manager.list_locations())
}

async fn create_location(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: LocationRequest = parse_body(&body)?;
    let location = Location::new(request.uuid, request.name, request.latitude, request.longitude)?;
    let id = location.id().to_string();

    state.manager.register_location(location)?;
    info!("Location {} created", id);
    Ok(created(format!("{}/location/{}", state.prefix, id)))
}

async fn get_location(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> Result<Json<LocationEntity>, AppError> {
    Ok(Json(state.manager.get_location(&location_id)?))
}

async fn update_location(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: LocationRequest = parse_body(&body)?;
    if request.uuid != location_id {
        return Err(RegistryError::IdMismatch {
            expected: location_id,
            actual: request.uuid,
        }
        .into());
    }

    let location = Location::new(request.uuid, request.name, request.latitude, request.longitude)?;
    state.manager.replace_location(location)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_location(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.manager.location_exists(&location_id) {
        return Err(RegistryError::LocationNotFound(location_id).into());
    }

    state.manager.remove_location(&location_id);
    refresh_device_gauge(&state.manager);
    info!("Location {} removed", location_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_devices(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<Device>>, AppError> {
    let mut devices = state.manager.list_devices_by_location(&location_id)?;
    if let Some(filter) = query.device_type.as_deref() {
        devices.retain(|d| d.device_type().as_str() == filter);
    }
    Ok(Json(devices))
}

async fn create_device(
    State(state): State<AppState>,
    Path(location_id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    if !state.manager.location_exists(&location_id) {
        return Err(RegistryError::LocationNotFound(location_id).into());
    }

    let request: DeviceRequest = parse_body(&body)?;
    let device = request.into_device(&location_id)?;
    let id = device.id().to_string();

    state.manager.add_device(&location_id, device)?;
    refresh_device_gauge(&state.manager);
    info!("Device {} created in location {}", id, location_id);
    Ok(created(format!(
        "{}/location/{}/device/{}",
        state.prefix, location_id, id
    )))
}

/// Resolves a device and checks it sits in the addressed location.
fn device_in_location(
    manager: &InventoryManager,
    location_id: &str,
    device_id: &str,
) -> Result<Device, RegistryError> {
    if !manager.location_exists(location_id) {
        return Err(RegistryError::LocationNotFound(location_id.to_string()));
    }
    manager
        .get_device_by_id(device_id)
        .ok()
        .filter(|d| d.location_id() == location_id)
        .ok_or_else(|| RegistryError::DeviceNotFound(device_id.to_string()))
}

async fn get_device(
    State(state): State<AppState>,
    Path((location_id, device_id)): Path<(String, String)>,
) -> Result<Json<Device>, AppError> {
    Ok(Json(device_in_location(&state.manager, &location_id, &device_id)?))
}

async fn update_device(
    State(state): State<AppState>,
    Path((location_id, device_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: DeviceRequest = parse_body(&body)?;
    let device = request.into_device(&location_id)?;

    state
        .manager
        .replace_device(&location_id, &device_id, device)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_device(
    State(state): State<AppState>,
    Path((location_id, device_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    device_in_location(&state.manager, &location_id, &device_id)?;

    state.manager.remove_device(&location_id, &device_id);
    refresh_device_gauge(&state.manager);
    info!("Device {} removed from location {}", device_id, location_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn move_device(
    State(state): State<AppState>,
    Path((location_id, device_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let request: MoveRequest = parse_body(&body)?;
    device_in_location(&state.manager, &location_id, &device_id)?;

    state.manager.move_device(&device_id, &request.location_id)?;
    info!(
        "Device {} moved from location {} to {}",
        device_id, location_id, request.location_id
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn get_telemetry(
    State(state): State<AppState>,
    Path((_location_id, device_id)): Path<(String, String)>,
) -> Result<Json<TelemetryResponse>, AppError> {
    let history = state.manager.get_telemetry_by_device(&device_id)?;
    let registered = !history.is_orphaned();
    let data = history.readings().to_vec();

    Ok(Json(TelemetryResponse {
        device_id,
        registered,
        total: data.len(),
        data,
    }))
}

enum AppError {
    Registry(RegistryError),
    BadRequest(String),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        Self::Registry(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::Registry(err) => {
                let status = match &err {
                    RegistryError::DuplicateId { .. } => StatusCode::CONFLICT,
                    RegistryError::LocationNotFound(_)
                    | RegistryError::DeviceNotFound(_)
                    | RegistryError::DeviceNotRegistered(_)
                    | RegistryError::TelemetryNotFound(_) => StatusCode::NOT_FOUND,
                    RegistryError::IdMismatch { .. }
                    | RegistryError::InvalidEntity { .. }
                    | RegistryError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
                };
                (status, err.to_string())
            }
        };

        REST_ERRORS_TOTAL.inc();
        warn!("API error ({}): {}", status, message);
        (status, Json(json!({ "error": message }))).into_response()
    }
}
