// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
mod commands;
mod output;
mod repo;

use anyhow::Result;
use bigfile_config::ObservabilityConfig;
use bigfile_git::SessionError;
use bigfile_observability::{init_tracing_with_config, LogConfig, LogFormat, LOG_ENV_VAR};
use clap::{Parser, Subcommand};
use commands::*;
use repo::BigfileRepo;

#[derive(Parser)]
#[command(name = "bigfile")]
#[command(version, about = "Large file filter for Git - keep big content out of history")]
#[command(
    long_about = "bigfile replaces large file content with small pointer files when Git stages it,
stores the content in a local content-addressed store, and restores it on checkout."
)]
#[command(propagate_version = true)]
#[command(author = "bigfile Contributors")]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format (pretty|compact|json)
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Colored output (always|auto|never)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a persistent filter session on stdin/stdout
    Filter(FilterCmd),

    /// Clean one file: content on stdin, pointer on stdout
    Clean(CleanCmd),

    /// Smudge one file: pointer on stdin, content on stdout
    Smudge(SmudgeCmd),

    /// Verify stored objects referenced by pointers
    Fsck(FsckCmd),

    /// Upload local objects to the remote directory
    Push(PushCmd),

    /// Register the filter driver in this repository
    Install(InstallCmd),

    /// Remove the filter driver from this repository
    Uninstall(UninstallCmd),

    /// Route file patterns through the filter
    Track(TrackCmd),

    /// Stop routing file patterns through the filter
    Untrack(UntrackCmd),

    /// Show the effective configuration
    Env(EnvCmd),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color.as_str() {
        "never" => console::set_colors_enabled(false),
        "always" => console::set_colors_enabled(true),
        "auto" => {}
        _ => {
            output::error(&format!("Invalid color option: {}", cli.color));
            std::process::exit(1);
        }
    }

    let observability = repository_logging().await;
    // Ignore errors if already initialized
    init_tracing_with_config(log_config(&cli, observability.as_ref())).ok();

    let result = match cli.command {
        Commands::Filter(cmd) => cmd.execute().await,
        Commands::Clean(cmd) => cmd.execute().await,
        Commands::Smudge(cmd) => cmd.execute().await,
        Commands::Fsck(cmd) => cmd.execute().await,
        Commands::Push(cmd) => cmd.execute().await,
        Commands::Install(cmd) => cmd.execute().await,
        Commands::Uninstall(cmd) => cmd.execute().await,
        Commands::Track(cmd) => cmd.execute().await,
        Commands::Untrack(cmd) => cmd.execute().await,
        Commands::Env(cmd) => cmd.execute().await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        output::error(&format!("Error: {:#}", e));
        std::process::exit(exit_code(&e));
    }

    Ok(())
}

/// Logging settings from the enclosing repository's config, if any
async fn repository_logging() -> Option<ObservabilityConfig> {
    let cwd = std::env::current_dir().ok()?;
    BigfileRepo::discover(&cwd)
        .await
        .ok()
        .map(|repo| repo.config.observability)
}

/// Precedence: `-v` flags, then `BIGFILE_LOG`/`RUST_LOG`, then the config file
fn log_config(cli: &Cli, observability: Option<&ObservabilityConfig>) -> LogConfig {
    let format = cli
        .log_format
        .or_else(|| observability.and_then(|o| o.log_format.parse().ok()))
        .unwrap_or_default();
    let mut config = LogConfig::new()
        .with_format(format)
        .with_color(console::colors_enabled_stderr());

    let env_set = std::env::var_os(LOG_ENV_VAR).is_some() || std::env::var_os("RUST_LOG").is_some();
    if cli.verbose > 0 {
        config = config.with_verbosity(cli.verbose);
    } else if let (false, Some(observability)) = (env_set, observability) {
        config = config.with_level(observability.log_level.to_lowercase());
    }
    config
}

/// Process status for a failed command
///
/// Session errors carry their own status; everything else is 1.
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<SessionError>()
        .map(SessionError::exit_code)
        .unwrap_or(1)
}

fn print_version() {
    println!("bigfile {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: {}", bigfile_git::protocol::handshake_offer().trim_end());
    println!("rust-version: {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("license: {}", env!("CARGO_PKG_LICENSE"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigfile_git::ProtocolFault;

    #[test]
    fn test_exit_code_mapping() {
        let fault: anyhow::Error = SessionError::from(ProtocolFault::UnexpectedEof("payload")).into();
        assert_eq!(exit_code(&fault), 3);

        let other = anyhow::anyhow!("disk full");
        assert_eq!(exit_code(&other), 1);
    }

    #[test]
    fn test_cli_parses_filter_commands() {
        let cli = Cli::try_parse_from(["bigfile", "smudge", "--skip", "--", "a.psd"]);
        assert!(cli.is_ok());
        let cli = Cli::try_parse_from(["bigfile", "-vv", "filter", "--skip"]);
        assert!(matches!(cli.map(|c| c.verbose), Ok(2)));
    }
}
