use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use sentinel_cli::{commands, logging, LogFormat, Snapshot, Summary};
use sentinel_model::SentinelConfig;
use serde::Serialize;
use std::path::PathBuf;

fn snapshot_arg() -> Arg {
    Arg::new("snapshot")
        .long("snapshot")
        .short('s')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Pipeline history snapshot (JSON)")
}

fn pipeline_arg() -> Arg {
    Arg::new("pipeline")
        .required(true)
        .help("Pipeline run id")
}

fn cli() -> Command {
    Command::new("ci-sentinel")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Failed pipeline triage, consent-gated remediation and history risk analysis")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("Log output format: text or json"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print results as JSON"),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify a failed run from its logs")
                .arg(snapshot_arg())
                .arg(pipeline_arg()),
        )
        .subcommand(
            Command::new("propose")
                .about("Propose remediation for a failed run")
                .arg(snapshot_arg())
                .arg(pipeline_arg())
                .arg(
                    Arg::new("approve")
                        .long("approve")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("decline")
                        .help("Approve the proposal and run it against the dry-run executor"),
                )
                .arg(
                    Arg::new("decline")
                        .long("decline")
                        .action(ArgAction::SetTrue)
                        .help("Decline the proposal"),
                ),
        )
        .subcommand(
            Command::new("cascade")
                .about("Downstream cascade risk of a failed run")
                .arg(snapshot_arg())
                .arg(pipeline_arg()),
        )
        .subcommand(
            Command::new("flaky")
                .about("Detect flaky branches across the snapshot")
                .arg(snapshot_arg()),
        )
        .subcommand(
            Command::new("changelog")
                .about("Correlate a failed run with its recent commits")
                .arg(snapshot_arg())
                .arg(pipeline_arg()),
        )
        .subcommand(
            Command::new("window")
                .about("Deployment window advice for a repository branch")
                .arg(snapshot_arg())
                .arg(Arg::new("repository").long("repo").required(true).help("Repository name"))
                .arg(Arg::new("branch").long("branch").default_value("main").help("Branch name"))
                .arg(
                    Arg::new("at")
                        .long("at")
                        .value_parser(value_parser!(DateTime<Utc>))
                        .help("Evaluate at this RFC 3339 instant instead of now"),
                ),
        )
}

fn emit<T: Serialize + Summary>(report: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{}", report.summary());
    }
    Ok(())
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a String> {
    args.get_one::<String>(name)
        .with_context(|| format!("missing argument: {name}"))
}

fn load_snapshot(args: &ArgMatches) -> Result<Snapshot> {
    let path = args
        .get_one::<PathBuf>("snapshot")
        .context("missing argument: snapshot")?;
    Snapshot::load(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let log_format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    logging::init(log_format);

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => SentinelConfig::load(path)?,
        None => SentinelConfig::default(),
    };
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("classify", args)) => {
            let snapshot = load_snapshot(args)?;
            emit(&commands::classify(&snapshot, required(args, "pipeline")?)?, json)
        }
        Some(("propose", args)) => {
            let snapshot = load_snapshot(args)?;
            let decision = if args.get_flag("approve") {
                Some(true)
            } else if args.get_flag("decline") {
                Some(false)
            } else {
                None
            };
            let report =
                commands::propose(&config, &snapshot, required(args, "pipeline")?, decision).await?;
            emit(&report, json)
        }
        Some(("cascade", args)) => {
            let snapshot = load_snapshot(args)?;
            let report = commands::cascade(&config, &snapshot, required(args, "pipeline")?).await?;
            emit(&report, json)
        }
        Some(("flaky", args)) => {
            let snapshot = load_snapshot(args)?;
            emit(&commands::flaky(&config, &snapshot), json)
        }
        Some(("changelog", args)) => {
            let snapshot = load_snapshot(args)?;
            emit(&commands::changelog(&snapshot, required(args, "pipeline")?)?, json)
        }
        Some(("window", args)) => {
            let snapshot = load_snapshot(args)?;
            let at = args.get_one::<DateTime<Utc>>("at").copied().unwrap_or_else(Utc::now);
            let report = commands::window(
                &snapshot,
                required(args, "repository")?,
                required(args, "branch")?,
                at,
            );
            emit(&report, json)
        }
        _ => Ok(()),
    }
}
