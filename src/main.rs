//! CLI for PopSub Client
//!
//! `popsub-client <host:port> <vpn> <username> <topic>` prints the first
//! message published on the topic and exits.

use clap::Parser;
use popsub_client::cli::{self, Cli};
use popsub_client::config::load_config;
use popsub_client::utils::logging;

#[tokio::main]
async fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => match cli::usage_exit_code(&e) {
            Some(code) => {
                eprintln!("{}", cli::USAGE);
                std::process::exit(code);
            }
            None => e.exit(),
        },
    };

    dotenvy::dotenv().ok();
    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(args.log_level.as_deref().unwrap_or(&settings.logging.level));

    std::process::exit(cli::run(args, &settings).await);
}
