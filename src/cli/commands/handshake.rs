use clap::{Arg, Command};

pub const ARG_PUBLIC_URL: &str = "public-url";
pub const ARG_EPHEMERAL_TTL_SECONDS: &str = "ephemeral-ttl-seconds";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PUBLIC_URL)
                .long("public-url")
                .help("Public base URL used to build upload links")
                .env("HANDOFF_PUBLIC_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_EPHEMERAL_TTL_SECONDS)
                .long("ephemeral-ttl-seconds")
                .help("Lifetime of a pending or filled flow token in seconds")
                .env("HANDOFF_EPHEMERAL_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long("session-ttl-seconds")
                .help("Lifetime of a minted session in seconds")
                .env("HANDOFF_SESSION_TTL_SECONDS")
                .default_value("5184000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
