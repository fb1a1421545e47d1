//! # Handoff (Ephemeral Token Handshake)
//!
//! `handoff` lets a client finish a multi-step identity operation (register,
//! restore access, reset credentials) without keeping long-lived state on the
//! client side.
//!
//! ## Protocol
//!
//! 1. **Issue:** a short-lived slot is reserved in the token store under
//!    `<flow>:<token id>` holding the sentinel `pending`, and the remote
//!    identity service is asked to start the flow.
//! 2. **Upload:** the client fills the slot with its credential. This succeeds
//!    at most once per slot.
//! 3. **Exchange:** the filled slot is consumed exactly once and a session is
//!    minted under `session:<id>`, living for 60 days independently of the slot.
//!
//! Reset differs: issuing it only asks the remote service to acknowledge the
//! reset email, and the slot is reserved by a separate confirm step.
//!
//! ## Storage
//!
//! Every transition goes through an atomic compare-and-set or compare-and-delete
//! on the store. With `--dsn` the slots live in `PostgreSQL` (see
//! `sql/schema.sql`) and a background worker purges expired rows; without it an
//! in-process store is used, which only suits a single node.

pub mod api;
pub mod cli;
pub mod handshake;
pub mod remote;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
