use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{GeoPoint, ScanEvent, VehicleId};
use super::repository::{AuditSink, RepositoryError, VehicleDirectory, WalletStore};
use super::service::{LevyService, LevyServiceError};
use super::wallet::{LedgerStream, StreamAmounts};

/// Router builder exposing the engine's operations over HTTP.
pub fn levy_router<V, W, A>(service: Arc<LevyService<V, W, A>>) -> Router
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/compliance/scans", post(scan_handler::<V, W, A>))
        .route("/api/v1/wallets/payments", post(payment_handler::<V, W, A>))
        .route(
            "/api/v1/wallets/:vehicle_id",
            get(wallet_status_handler::<V, W, A>),
        )
        .route(
            "/api/v1/wallets/:vehicle_id/next-due",
            get(next_due_handler::<V, W, A>),
        )
        .route("/api/v1/accruals", post(accrual_handler::<V, W, A>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanRequest {
    pub(crate) vehicle_id: String,
    pub(crate) latitude: f64,
    pub(crate) longitude: f64,
    pub(crate) recorded_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    pub(crate) vehicle_id: String,
    pub(crate) stream: LedgerStream,
    pub(crate) amount: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct PaymentResponse {
    pub(crate) vehicle_id: VehicleId,
    pub(crate) balances: StreamAmounts,
    pub(crate) owings: StreamAmounts,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AsOfParams {
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccrualRequest {
    pub(crate) period: NaiveDate,
}

pub(crate) async fn scan_handler<V, W, A>(
    State(service): State<Arc<LevyService<V, W, A>>>,
    axum::Json(request): axum::Json<ScanRequest>,
) -> Response
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    let scan = ScanEvent {
        vehicle_id: VehicleId(request.vehicle_id),
        point: GeoPoint::new(request.longitude, request.latitude),
        recorded_at: request.recorded_at,
    };

    match service.handle_scan(scan) {
        Ok(verdict) => (StatusCode::OK, axum::Json(verdict)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn payment_handler<V, W, A>(
    State(service): State<Arc<LevyService<V, W, A>>>,
    axum::Json(request): axum::Json<PaymentRequest>,
) -> Response
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    let vehicle_id = VehicleId(request.vehicle_id);
    match service.apply_payment(&vehicle_id, request.stream, request.amount) {
        Ok(wallet) => {
            let body = PaymentResponse {
                vehicle_id,
                balances: wallet.balances(),
                owings: wallet.owings(),
            };
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn wallet_status_handler<V, W, A>(
    State(service): State<Arc<LevyService<V, W, A>>>,
    Path(vehicle_id): Path<String>,
    Query(params): Query<AsOfParams>,
) -> Response
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    let vehicle_id = VehicleId(vehicle_id);
    let today = params.today.unwrap_or_else(|| Utc::now().date_naive());
    match service.wallet_status(&vehicle_id, today) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn next_due_handler<V, W, A>(
    State(service): State<Arc<LevyService<V, W, A>>>,
    Path(vehicle_id): Path<String>,
    Query(params): Query<AsOfParams>,
) -> Response
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    let vehicle_id = VehicleId(vehicle_id);
    let today = params.today.unwrap_or_else(|| Utc::now().date_naive());
    match service.next_payment_date(&vehicle_id, today) {
        Ok(due_on) => (
            StatusCode::OK,
            axum::Json(json!({ "vehicle_id": vehicle_id.0, "due_on": due_on })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn accrual_handler<V, W, A>(
    State(service): State<Arc<LevyService<V, W, A>>>,
    axum::Json(request): axum::Json<AccrualRequest>,
) -> Response
where
    V: VehicleDirectory + 'static,
    W: WalletStore + 'static,
    A: AuditSink + 'static,
{
    match service.run_daily_accrual(request.period) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

/// Map the service taxonomy onto HTTP statuses without collapsing the
/// distinctions callers retry on.
fn error_response(err: LevyServiceError) -> Response {
    let status = match &err {
        LevyServiceError::VehicleNotFound(_) => StatusCode::NOT_FOUND,
        LevyServiceError::InvalidCoordinates { .. }
        | LevyServiceError::InvalidAmount
        | LevyServiceError::RateNotConfigured { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LevyServiceError::WalletContention(_) => StatusCode::CONFLICT,
        LevyServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LevyServiceError::Audit(_)
        | LevyServiceError::Tariff(_)
        | LevyServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let body = axum::Json(json!({ "error": err.to_string() }));
    (status, body).into_response()
}
