#![allow(clippy::needless_for_each)]

use utoipa::{
    openapi::{Contact, License},
    OpenApi,
};

use super::handlers::{flows, health, types};
use crate::handshake::FlowType;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        flows::issue,
        flows::confirm,
        flows::upload,
        flows::exchange
    ),
    components(schemas(
        health::Health,
        FlowType,
        types::IssueRequest,
        types::IssueResponse,
        types::ConfirmResponse,
        types::UploadRequest,
        types::UploadResponse,
        types::ExchangeResponse,
        types::FailureResponse
    )),
    tags(
        (name = "health", description = "Liveness and token store reachability"),
        (name = "flows", description = "Ephemeral token handshake for register, restore and reset")
    )
)]
struct ApiDoc;

/// `OpenAPI` document with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = cargo_license();

    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        let name = if name.is_empty() { None } else { Some(name) };
        let email = if email.is_empty() { None } else { Some(email) };
        (name, email)
    } else {
        let name = author.trim();
        (if name.is_empty() { None } else { Some(name) }, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_comes_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(
            doc.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
        let contact = doc.info.contact;
        assert_eq!(
            contact.as_ref().and_then(|c| c.email.clone()),
            Some("team@handoff.dev".to_string())
        );
    }

    #[test]
    fn documents_every_flow_route() {
        let doc = openapi();
        for path in [
            "/health",
            "/v1/flows/{flow}/issue",
            "/v1/flows/{flow}/confirm",
            "/v1/flows/{flow}/{token_id}/upload",
            "/v1/flows/{flow}/{token_id}/exchange",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Handoff <team@handoff.dev>"),
            (Some("Team Handoff"), Some("team@handoff.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
    }
}
