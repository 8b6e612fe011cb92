//! Reservation handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::Principal;
use crate::models::reservation::Reservation;
use crate::reservations;
use crate::state::AppState;
use crate::Result;

/// Request body for `POST /v1/reservations`.
#[derive(Debug, Deserialize)]
pub struct AcquireBody {
    /// Opaque lease key.
    pub resource_key: String,
    /// Requested TTL; defaults and clamps to configured bounds.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
    /// Caller metadata relayed verbatim.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// `POST /v1/reservations`.
pub async fn acquire(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<AcquireBody>,
) -> Result<Json<reservations::AcquireResult>> {
    let result = reservations::acquire(
        &state,
        &principal,
        &body.resource_key,
        body.ttl_seconds,
        body.metadata,
    )
    .await?;
    Ok(Json(result))
}

/// Request body for `POST /v1/reservations/renew`.
#[derive(Debug, Deserialize)]
pub struct RenewBody {
    /// Lease key to extend.
    pub resource_key: String,
    /// Requested TTL; defaults and clamps to configured bounds.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// `POST /v1/reservations/renew`.
pub async fn renew(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<RenewBody>,
) -> Result<Json<reservations::RenewResult>> {
    Ok(Json(
        reservations::renew(&state, &principal, &body.resource_key, body.ttl_seconds).await?,
    ))
}

/// Request body for `POST /v1/reservations/release`.
#[derive(Debug, Deserialize)]
pub struct ReleaseBody {
    /// Lease key to release.
    pub resource_key: String,
}

/// `POST /v1/reservations/release`.
pub async fn release(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<ReleaseBody>,
) -> Result<Json<reservations::ReleaseResult>> {
    Ok(Json(
        reservations::release(&state, &principal, &body.resource_key).await?,
    ))
}

/// Query parameters for `GET /v1/reservations`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Restrict to keys with this prefix.
    #[serde(default)]
    pub prefix: Option<String>,
}

/// One row of the listing, with the remaining TTL precomputed.
#[derive(Debug, Serialize)]
pub struct ReservationRow {
    /// The lease itself.
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Seconds until expiry.
    pub remaining_seconds: i64,
}

/// `GET /v1/reservations`.
pub async fn list(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReservationRow>>> {
    let now = chrono::Utc::now();
    let rows = reservations::list(&state, &principal, query.prefix.as_deref())
        .await?
        .into_iter()
        .map(|reservation| ReservationRow {
            remaining_seconds: reservation.remaining_seconds(now),
            reservation,
        })
        .collect();
    Ok(Json(rows))
}
