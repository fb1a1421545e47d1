use crate::cli::{
    actions::{server::Args, Action},
    commands::{handshake, remote, store, ARG_PORT},
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>(store::ARG_DSN).cloned();

    let remote_url = matches
        .get_one::<String>(remote::ARG_REMOTE_URL)
        .context("missing required argument: --remote-url")?;
    let remote_url = Url::parse(remote_url).context("invalid HANDOFF_REMOTE_URL")?;

    let bootstrap_token = matches
        .get_one::<String>(remote::ARG_BOOTSTRAP_TOKEN)
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --bootstrap-token")?;

    let public_url = matches
        .get_one::<String>(handshake::ARG_PUBLIC_URL)
        .context("missing required argument: --public-url")?;
    let public_url = Url::parse(public_url).context("invalid HANDOFF_PUBLIC_URL")?;

    let ephemeral_ttl_seconds = matches
        .get_one::<u64>(handshake::ARG_EPHEMERAL_TTL_SECONDS)
        .copied()
        .unwrap_or(crate::handshake::DEFAULT_EPHEMERAL_TTL_SECONDS);
    let session_ttl_seconds = matches
        .get_one::<u64>(handshake::ARG_SESSION_TTL_SECONDS)
        .copied()
        .unwrap_or(crate::handshake::DEFAULT_SESSION_TTL_SECONDS);
    let purge_interval_seconds = matches
        .get_one::<u64>(store::ARG_PURGE_INTERVAL_SECONDS)
        .copied()
        .unwrap_or(60);

    Ok(Action::Server(Args {
        port,
        dsn,
        public_url,
        remote_url,
        bootstrap_token,
        ephemeral_ttl_seconds,
        session_ttl_seconds,
        purge_interval_seconds,
    }))
}
