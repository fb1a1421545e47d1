use clap::{Arg, Command};

pub const ARG_DSN: &str = "dsn";
pub const ARG_PURGE_INTERVAL_SECONDS: &str = "purge-interval-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .long_help(
                    "PostgreSQL connection string for the token store. When omitted, tokens are kept in process memory, which only works for a single instance.",
                )
                .env("HANDOFF_DSN"),
        )
        .arg(
            Arg::new(ARG_PURGE_INTERVAL_SECONDS)
                .long("purge-interval-seconds")
                .help("How often expired tokens are purged from the token store")
                .env("HANDOFF_PURGE_INTERVAL_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
