// Copyright 2026 homework-harvest contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

mod cli;

use cli::output::OutputFormat;
use cli::{ConfigArgs, FilterArgs, LoginArgs};

#[derive(Parser)]
#[command(
    name = "hwharvest",
    about = "Fetch homework assignments from the BJTU course platform",
    version,
    after_help = "Run 'hwharvest <command> --help' for details on each command."
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, harvest homework and print it
    Query {
        #[command(flatten)]
        login: LoginArgs,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        config: ConfigArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
        /// Order by due time, undated last
        #[arg(long)]
        sort: bool,
    },
    /// Serve the query over HTTP
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Listen port
        #[arg(long, default_value = "8000")]
        port: u16,
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Check browser and OCR availability
    Doctor {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let result = match cli.command {
        Commands::Query {
            login,
            filter,
            config,
            format,
            sort,
        } => cli::query_cmd::run(&login, &filter, &config, format, sort).await,
        Commands::Serve { host, port, config } => cli::serve::run(&host, port, &config).await,
        Commands::Doctor { config } => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "hwharvest", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = &result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }

    result
}
