//! HTTP boundary: router, submission handler, CORS.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::Method;
use axum::routing::post;
use axum::{Json, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::dispatch::MailDispatcher;
use crate::errors::ConfigError;
use crate::journal::{Attempt, Journal};
use crate::response::ResponseEnvelope;
use crate::submission::{RawSubmission, Submission};

#[derive(Clone)]
pub struct AppState {
    /// `None` when delivery configuration is incomplete; every
    /// submission is then refused with a 500 before any input or
    /// network activity.
    pub dispatcher: Option<Arc<MailDispatcher>>,
    pub journal: Arc<Journal>,
}

pub fn router(state: AppState, config: &AppConfig) -> Result<Router, ConfigError> {
    let origin = match &config.allow_origin {
        Some(origin) => AllowOrigin::exact(
            origin
                .parse()
                .map_err(|_| ConfigError::InvalidOrigin(origin.clone()))?,
        ),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Ok(Router::new()
        .route("/api/contact", post(submit))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn submit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    payload: Result<Json<RawSubmission>, JsonRejection>,
) -> ResponseEnvelope {
    // Configuration gate first: a partially configured service refuses
    // the request before looking at user input.
    let Some(dispatcher) = state.dispatcher.clone() else {
        return ResponseEnvelope::config_failure();
    };

    let Json(raw) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "malformed submission body");
            return ResponseEnvelope::invalid_json();
        }
    };

    let submission = match Submission::validate(raw) {
        Ok(submission) => submission,
        Err(err) => {
            tracing::debug!(error = %err, "submission rejected");
            return ResponseEnvelope::validation(err);
        }
    };

    let outcome = dispatcher.dispatch(&submission, addr.ip()).await;
    state
        .journal
        .record(Attempt {
            success: outcome.result.success,
            name: submission.name.clone(),
            email: submission.email.clone(),
            detail: outcome.detail,
        })
        .await;

    ResponseEnvelope::from_result(outcome.result)
}

async fn method_not_allowed() -> ResponseEnvelope {
    ResponseEnvelope::method_not_allowed()
}

async fn not_found() -> ResponseEnvelope {
    ResponseEnvelope::not_found()
}
