//! HTTP surface for an external scheduler and the operator.
//!
//! | Route | Method | Operation |
//! |-------|--------|-----------|
//! | `/` | GET | service banner |
//! | `/health` | GET | liveness |
//! | `/status` | GET | [`Campaign::status`] |
//! | `/cron/send-emails` | GET, POST | [`Campaign::send_next`] with the business-hours gate |
//! | `/test-email` | POST | [`Campaign::send_next`] as a manual test |
//! | `/debug-csv` | GET | [`Campaign::preview`] |
//! | `/reset-counter` | POST | [`Campaign::reset`] |
//!
//! Every dispatch outcome, `failed` included, is a 200 with the report body.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use time::OffsetDateTime;

use crate::campaign::{rfc3339, Campaign, DispatchReport, Preview, ResetReport, StatusReport, Trigger};
use crate::error::Result;

type JsonResult<T> = Result<Json<T>>;

pub fn api_router(campaign: Arc<Campaign>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/cron/send-emails", get(send_scheduled).post(send_scheduled))
        .route("/test-email", post(send_manual))
        .route("/debug-csv", get(preview))
        .route("/reset-counter", post(reset))
        .with_state(campaign)
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "coldmail",
        "version": env!("CARGO_PKG_VERSION"),
        "features": [
            "sequential contact selection with a persisted cursor",
            "business-hours delivery gate",
            "failed sends logged and skipped",
        ],
        "endpoints": {
            "/health": "GET",
            "/status": "GET",
            "/cron/send-emails": "GET|POST",
            "/test-email": "POST",
            "/debug-csv": "GET",
            "/reset-counter": "POST",
        },
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": rfc3339(OffsetDateTime::now_utc()),
    }))
}

async fn status(State(campaign): State<Arc<Campaign>>) -> Json<StatusReport> {
    Json(campaign.status().await)
}

async fn send_scheduled(State(campaign): State<Arc<Campaign>>) -> JsonResult<DispatchReport> {
    dispatch(&campaign, Trigger::Scheduled).await
}

async fn send_manual(State(campaign): State<Arc<Campaign>>) -> JsonResult<DispatchReport> {
    dispatch(&campaign, Trigger::Manual).await
}

async fn dispatch(campaign: &Campaign, trigger: Trigger) -> JsonResult<DispatchReport> {
    let report = campaign.send_next(trigger).await?;
    report.trace();
    Ok(Json(report))
}

async fn preview(State(campaign): State<Arc<Campaign>>) -> JsonResult<Preview> {
    Ok(Json(campaign.preview().await?))
}

async fn reset(State(campaign): State<Arc<Campaign>>) -> JsonResult<ResetReport> {
    let report = campaign.reset().await?;
    tracing::info!("counter reset to 0");
    Ok(Json(report))
}
