mod config;
mod git;
mod github;
mod migrate;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, info_span};
use tracing_subscriber::EnvFilter;

/// fork-migrate: moves pull requests labelled `fork_compare` onto branches
/// of a fresh fork under a target organization, recreates them against that
/// fork and replays their review threads.
#[derive(Parser, Debug)]
#[command(name = "fork-migrate", version, about)]
struct Cli {
    /// Source repository (owner/name or https URL)
    #[arg(short, long)]
    repo: String,

    /// Organization that will own the fork (overrides TARGET_ORG)
    #[arg(long)]
    org: Option<String>,

    /// Config file (defaults to .fork-migrate.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Optional output file path for a markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Collect and report only; no fork, pushes or pull request writes
    #[arg(long)]
    dry_run: bool,

    /// Leave the original pull requests open
    #[arg(long)]
    keep_original: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let _main_span = info_span!("fork_migrate", repo = %cli.repo).entered();

    let source = github::parse_repo(&cli.repo)?;
    debug!(owner = %source.owner, name = %source.name, "parsed repository");

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref())?;
    let token = config.github_token()?;
    let target_org = if cli.dry_run {
        config.target_org(cli.org.as_deref()).unwrap_or_default()
    } else {
        config.target_org(cli.org.as_deref())?
    };

    let settings = migrate::MigrationSettings {
        label: config.migration.label.clone(),
        base_branch: config.migration.base_branch.clone(),
        target_org,
        close_original: config.migration.close_original && !cli.keep_original,
        dry_run: cli.dry_run,
        fork_poll: migrate::ForkPoll {
            attempts: config.fork.poll_attempts,
            interval: config.fork.poll_interval(),
        },
        git_host: config.github.git_host.clone(),
        token: token.clone(),
    };

    let api = github::GitHubClient::new(
        token.clone(),
        &config.github.api_base,
        github::client::RetryPolicy::from(&config.retry),
    )?;
    let git = git::CommandGit::new(vec![token]);

    let migration_report = migrate::run(&api, &git, &source, &settings).await?;
    report::output(&migration_report, cli.output.as_deref())?;
    info!(
        outcomes = migration_report.outcomes.len(),
        failures = migration_report.failure_count(),
        "done"
    );

    if migration_report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repo_is_required() {
        assert!(Cli::try_parse_from(["fork-migrate"]).is_err());
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "fork-migrate",
            "-r",
            "org/repo",
            "--org",
            "acme",
            "--dry-run",
            "--keep-original",
            "-o",
            "report.md",
        ])
        .unwrap();
        assert_eq!(cli.repo, "org/repo");
        assert_eq!(cli.org.as_deref(), Some("acme"));
        assert!(cli.dry_run);
        assert!(cli.keep_original);
        assert_eq!(cli.output, Some(PathBuf::from("report.md")));
    }

    #[test]
    fn test_long_repo_flag() {
        let cli = Cli::try_parse_from(["fork-migrate", "--repo=org/repo"]).unwrap();
        assert_eq!(cli.repo, "org/repo");
        assert!(!cli.dry_run);
    }
}
