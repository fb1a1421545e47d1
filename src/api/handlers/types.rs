//! Request/response bodies for the flow endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::handshake::{IssuedFlow, Reservation, SessionGrant};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct IssueRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_flow_token: Option<String>,
}

impl From<IssuedFlow> for IssueResponse {
    fn from(issued: IssuedFlow) -> Self {
        let (token_id, upload_url) = issued.reservation.map_or((None, None), |reservation| {
            (
                Some(reservation.token_id.to_string()),
                Some(reservation.upload_url),
            )
        });
        Self {
            token_id,
            upload_url,
            remote_flow_token: issued.remote_flow_token,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub token_id: String,
    pub upload_url: String,
}

impl From<Reservation> for ConfirmResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            token_id: reservation.token_id.to_string(),
            upload_url: reservation.upload_url,
        }
    }
}

#[derive(ToSchema, Deserialize)]
pub struct UploadRequest {
    pub credential: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub success: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResponse {
    pub success: bool,
    pub session_id: String,
    pub expires_in: u64,
}

impl From<SessionGrant> for ExchangeResponse {
    fn from(grant: SessionGrant) -> Self {
        Self {
            success: true,
            session_id: grant.session_id,
            expires_in: grant.expires_in,
        }
    }
}

/// Body of every failed flow call; `error` is the stable failure code.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

impl FailureResponse {
    #[must_use]
    pub fn new(code: &str) -> Self {
        Self {
            success: false,
            error: code.to_string(),
        }
    }
}
