mod cli;
mod commands;
mod error;
mod util;

use structopt::StructOpt;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::from_args();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::List(args) => commands::list(args),
        Commands::Extract(args) => commands::extract(args),
        Commands::Streams(args) => commands::streams(args),
        Commands::Crack(args) => commands::crack(args),
        Commands::Hashes(args) => commands::hashes(args),
        Commands::Validate(args) => commands::validate(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = std::error::Error::source(&e);
        while let Some(e) = source {
            eprintln!("  Caused by: {}", e);
            source = e.source();
        }
        std::process::exit(1);
    }
}
