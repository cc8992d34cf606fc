//! Read-only HTML pages over the inventory.

use crate::errors::RegistryError;
use crate::manager::InventoryManager;
use crate::model::{Device, LocationEntity, TelemetryHistory};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::fmt::Write;
use std::sync::Arc;

pub fn create_router(manager: Arc<InventoryManager>) -> Router {
    Router::new()
        .route("/locations", get(locations))
        .route("/location/:location_id/devices", get(devices))
        .route(
            "/location/:location_id/device/:device_id/telemetry",
            get(telemetry),
        )
        .with_state(manager)
}

async fn locations(State(manager): State<Arc<InventoryManager>>) -> Html<String> {
    Html(render_locations(&manager.list_locations()))
}

async fn devices(
    State(manager): State<Arc<InventoryManager>>,
    Path(location_id): Path<String>,
) -> Response {
    match manager.list_devices_by_location(&location_id) {
        Ok(devices) => Html(render_devices(&location_id, &devices)).into_response(),
        Err(e) => not_found(&e),
    }
}

async fn telemetry(
    State(manager): State<Arc<InventoryManager>>,
    Path((location_id, device_id)): Path<(String, String)>,
) -> Response {
    match manager.get_telemetry_by_device(&device_id) {
        Ok(history) => Html(render_telemetry(&location_id, &device_id, &history)).into_response(),
        Err(e) => not_found(&e),
    }
}

fn not_found(err: &RegistryError) -> Response {
    let body = page("Not found", &format!("<p>{}</p>", escape(&err.to_string())));
    (StatusCode::NOT_FOUND, Html(body)).into_response()
}

/// Minimal HTML escaping for text and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        escape(title),
        escape(title),
        body
    )
}

pub fn render_locations(locations: &[LocationEntity]) -> String {
    let mut rows = String::new();
    for entity in locations {
        let location = &entity.location;
        let id = escape(location.id());
        // write! into a String cannot fail
        let _ = write!(
            rows,
            "<tr><td><a href=\"/location/{id}/devices\">{id}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(location.name()),
            location.latitude(),
            location.longitude(),
            entity.device_ids.len(),
        );
    }

    page(
        "Locations",
        &format!(
            "<table>\n<tr><th>Id</th><th>Name</th><th>Latitude</th><th>Longitude</th><th>Devices</th></tr>\n{}</table>",
            rows
        ),
    )
}

pub fn render_devices(location_id: &str, devices: &[Device]) -> String {
    let location = escape(location_id);
    let mut rows = String::new();
    for device in devices {
        let id = escape(device.id());
        let _ = write!(
            rows,
            "<tr><td><a href=\"/location/{location}/device/{id}/telemetry\">{id}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(device.name()),
            escape(device.device_type().as_str()),
            escape(device.manufacturer()),
            escape(device.software_version()),
            device.latitude(),
            device.longitude(),
        );
    }

    page(
        &format!("Devices of {}", location_id),
        &format!(
            "<p><a href=\"/locations\">Back to locations</a></p>\n<table>\n<tr><th>Id</th><th>Name</th><th>Type</th><th>Manufacturer</th><th>Software</th><th>Latitude</th><th>Longitude</th></tr>\n{}</table>",
            rows
        ),
    )
}

pub fn render_telemetry(location_id: &str, device_id: &str, history: &TelemetryHistory) -> String {
    let mut rows = String::new();
    for reading in history.readings() {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            reading.timestamp().to_rfc3339(),
            escape(reading.data_type()),
            escape(&reading.value().to_string()),
        );
    }

    let note = if history.is_orphaned() {
        "<p>Device is no longer registered; showing retained history.</p>\n"
    } else {
        ""
    };

    page(
        &format!("Telemetry of {}", device_id),
        &format!(
            "<p><a href=\"/location/{}/devices\">Back to devices</a></p>\n{}<table>\n<tr><th>Timestamp</th><th>Type</th><th>Value</th></tr>\n{}</table>",
            escape(location_id),
            note,
            rows
        ),
    )
}
