//! Flow endpoints: issue, confirm, upload, exchange.
//!
//! State-machine failures are ordinary responses carrying
//! `{"success": false, "error": "<code>"}`; only remote and infrastructure
//! failures are logged as errors.

use axum::{
    extract::{Extension, Path},
    http::{header::CACHE_CONTROL, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{
    ConfirmResponse, ExchangeResponse, FailureResponse, IssueRequest, IssueResponse,
    UploadRequest, UploadResponse,
};
use crate::handshake::{FlowType, HandshakeCoordinator, HandshakeError, TokenId};

/// Start a flow for an email.
#[utoipa::path(
    post,
    path = "/v1/flows/{flow}/issue",
    request_body = IssueRequest,
    params(
        ("flow" = FlowType, Path, description = "register, restore or reset")
    ),
    responses(
        (status = 201, description = "Flow started", body = IssueResponse),
        (status = 400, description = "Invalid flow or email", body = FailureResponse),
        (status = 502, description = "Remote identity service failed", body = FailureResponse),
        (status = 503, description = "Token store unavailable", body = FailureResponse)
    ),
    tag = "flows"
)]
pub async fn issue(
    Extension(coordinator): Extension<Arc<HandshakeCoordinator>>,
    Path(flow): Path<String>,
    payload: Option<Json<IssueRequest>>,
) -> Response {
    let flow = match flow.parse::<FlowType>() {
        Ok(flow) => flow,
        Err(err) => return failure(&err),
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    match coordinator.issue(flow, &request.email).await {
        Ok(issued) => no_store(StatusCode::CREATED, Json(IssueResponse::from(issued))),
        Err(err) => failure(&err),
    }
}

/// Reserve the reset slot after the reset email was confirmed.
///
/// Only the reset flow has a confirm step; any other flow is rejected.
#[utoipa::path(
    post,
    path = "/v1/flows/{flow}/confirm",
    params(
        ("flow" = FlowType, Path, description = "Must be reset")
    ),
    responses(
        (status = 201, description = "Reset slot reserved", body = ConfirmResponse),
        (status = 400, description = "Flow has no confirm step", body = FailureResponse),
        (status = 503, description = "Token store unavailable", body = FailureResponse)
    ),
    tag = "flows"
)]
pub async fn confirm(
    Extension(coordinator): Extension<Arc<HandshakeCoordinator>>,
    Path(flow): Path<String>,
) -> Response {
    match flow.parse::<FlowType>() {
        Ok(FlowType::Reset) => {}
        Ok(other) => {
            return failure(&HandshakeError::Validation(format!(
                "flow {other} has no confirm step"
            )))
        }
        Err(err) => return failure(&err),
    }

    match coordinator.confirm().await {
        Ok(reservation) => no_store(
            StatusCode::CREATED,
            Json(ConfirmResponse::from(reservation)),
        ),
        Err(err) => failure(&err),
    }
}

/// Fill a pending token with the client's credential.
#[utoipa::path(
    post,
    path = "/v1/flows/{flow}/{token_id}/upload",
    request_body = UploadRequest,
    params(
        ("flow" = FlowType, Path, description = "register, restore or reset"),
        ("token_id" = String, Path, description = "Ephemeral token id")
    ),
    responses(
        (status = 200, description = "Credential stored", body = UploadResponse),
        (status = 400, description = "Invalid input", body = FailureResponse),
        (status = 404, description = "Token unknown or expired", body = FailureResponse),
        (status = 409, description = "Token already filled", body = FailureResponse)
    ),
    tag = "flows"
)]
pub async fn upload(
    Extension(coordinator): Extension<Arc<HandshakeCoordinator>>,
    Path((flow, token_id)): Path<(String, String)>,
    payload: Option<Json<UploadRequest>>,
) -> Response {
    let (flow, token_id) = match parse_target(&flow, &token_id) {
        Ok(target) => target,
        Err(err) => return failure(&err),
    };
    let Some(Json(request)) = payload else {
        return missing_payload();
    };

    let credential = SecretString::from(request.credential);
    match coordinator.upload(flow, &token_id, &credential).await {
        Ok(()) => (StatusCode::OK, Json(UploadResponse { success: true })).into_response(),
        Err(err) => failure(&err),
    }
}

/// Exchange a filled token for a session.
#[utoipa::path(
    post,
    path = "/v1/flows/{flow}/{token_id}/exchange",
    params(
        ("flow" = FlowType, Path, description = "register, restore or reset"),
        ("token_id" = String, Path, description = "Ephemeral token id")
    ),
    responses(
        (status = 200, description = "Session issued", body = ExchangeResponse),
        (status = 400, description = "Invalid input", body = FailureResponse),
        (status = 404, description = "Token not ready", body = FailureResponse),
        (status = 409, description = "Token already consumed", body = FailureResponse)
    ),
    tag = "flows"
)]
pub async fn exchange(
    Extension(coordinator): Extension<Arc<HandshakeCoordinator>>,
    Path((flow, token_id)): Path<(String, String)>,
) -> Response {
    let (flow, token_id) = match parse_target(&flow, &token_id) {
        Ok(target) => target,
        Err(err) => return failure(&err),
    };

    match coordinator.exchange(flow, &token_id).await {
        Ok(grant) => no_store(StatusCode::OK, Json(ExchangeResponse::from(grant))),
        Err(err) => failure(&err),
    }
}

fn parse_target(flow: &str, token_id: &str) -> Result<(FlowType, TokenId), HandshakeError> {
    Ok((flow.parse()?, TokenId::parse(token_id)?))
}

fn status_for(err: &HandshakeError) -> StatusCode {
    match err {
        HandshakeError::Validation(_) => StatusCode::BAD_REQUEST,
        HandshakeError::NotReady => StatusCode::NOT_FOUND,
        HandshakeError::NotPending | HandshakeError::AlreadyConsumed => StatusCode::CONFLICT,
        HandshakeError::Remote(_) => StatusCode::BAD_GATEWAY,
        HandshakeError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        HandshakeError::Entropy(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(err: &HandshakeError) -> Response {
    if err.is_state_violation() || matches!(err, HandshakeError::Validation(_)) {
        debug!("flow request rejected: {err}");
    } else {
        error!("flow request failed: {err}");
    }
    (status_for(err), Json(FailureResponse::new(err.code()))).into_response()
}

fn missing_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(FailureResponse::new("validation")),
    )
        .into_response()
}

fn no_store(status: StatusCode, body: impl IntoResponse) -> Response {
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
