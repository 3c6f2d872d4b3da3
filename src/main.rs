use clap::Parser;
use robogo::app::{handle_fatal_error, init_logging, AppConfig};
use robogo::cli::{execute_command, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let config = match AppConfig::new(verbose) {
        Ok(config) => config,
        Err(e) => handle_fatal_error(e, verbose),
    };
    init_logging(&config);

    match execute_command(cli.command, &config).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => handle_fatal_error(e, verbose),
    }
}
