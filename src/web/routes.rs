//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::dto::*;
use crate::client::Client;
use crate::error::Error;
use crate::models::{Coordinate, ServiceAdvisory};

/// Stops returned by `/by-location`.
const NEAREST_LIMIT: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn Client>,
}

impl AppState {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self { client }
    }

    fn meta(&self) -> ResponseMetadata {
        ResponseMetadata::new(
            self.client.last_realtime_update(),
            self.client.last_static_update(),
        )
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/by-location", get(by_location))
        .route("/by-route/:route", get(by_route))
        .route("/by-id/:ids", get(by_ids))
        .route("/routes", get(routes))
        .route("/alerts", get(alerts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Json<Envelope<IndexData>> {
    Json(Envelope {
        data: IndexData {
            title: env!("CARGO_PKG_NAME"),
            readme: "GET /by-location?lat=&lon=, /by-route/{route}, /by-id/{id,...}, /routes, /alerts",
        },
        meta: state.meta(),
    })
}

#[derive(Debug, Deserialize)]
struct LocationQuery {
    lat: Option<String>,
    lon: Option<String>,
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64, AppError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| AppError::BadRequest {
            message: format!("Invalid {name} parameter"),
        })
}

async fn by_location(
    State(state): State<AppState>,
    Query(query): Query<LocationQuery>,
) -> Result<Json<Envelope<Vec<StopResponse>>>, AppError> {
    let (Some(lat), Some(lon)) = (query.lat.as_deref(), query.lon.as_deref()) else {
        return Err(AppError::BadRequest {
            message: "Missing lat/lon parameter".into(),
        });
    };
    let location = Coordinate::new(parse_coordinate("lat", lat)?, parse_coordinate("lon", lon)?);

    let stops = state.client.stops_by_location(location, NEAREST_LIMIT)?;
    Ok(Json(stops_envelope(stops, state.meta())))
}

async fn by_route(
    State(state): State<AppState>,
    Path(route): Path<String>,
) -> Result<Json<Envelope<Vec<StopResponse>>>, AppError> {
    let stops = state.client.stops_by_route(&route)?;
    Ok(Json(stops_envelope(stops, state.meta())))
}

async fn by_ids(
    State(state): State<AppState>,
    Path(ids): Path<String>,
) -> Result<Json<Envelope<Vec<StopResponse>>>, AppError> {
    let ids: Vec<String> = ids.split(',').map(|id| id.trim().to_string()).collect();
    let stops = state.client.stops_by_ids(&ids)?;
    Ok(Json(stops_envelope(stops, state.meta())))
}

async fn routes(State(state): State<AppState>) -> Result<Json<Envelope<Vec<String>>>, AppError> {
    let routes = state.client.routes()?;
    Ok(Json(Envelope {
        data: routes,
        meta: state.meta(),
    }))
}

async fn alerts(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<ServiceAdvisory>>>, AppError> {
    let advisories = state.client.service_advisories()?;
    Ok(Json(Envelope {
        data: advisories,
        meta: state.meta(),
    }))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => AppError::NotFound {
                message: e.to_string(),
            },
            _ => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(%status, error = %message, "Request failed");

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
