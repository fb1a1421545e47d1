use clap::{Arg, Command};

pub const ARG_REMOTE_URL: &str = "remote-url";
pub const ARG_BOOTSTRAP_TOKEN: &str = "bootstrap-token";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_REMOTE_URL)
                .long("remote-url")
                .help("Base URL of the remote identity service, example: https://id.tld")
                .env("HANDOFF_REMOTE_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_BOOTSTRAP_TOKEN)
                .long("bootstrap-token")
                .help("Token exchanged for an integration record at startup")
                .env("HANDOFF_BOOTSTRAP_TOKEN")
                .hide_env_values(true)
                .required(true),
        )
}
