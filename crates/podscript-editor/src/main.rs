use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use podscript_editor::replay::{replay, ReplayScript};
use podscript_editor::{init_tracing, EditorConfig, LogFormat};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("podscript-replay")
        .version(podscript_editor::VERSION)
        .about("Replay a scripted podcast editing session and print the resulting views")
        .arg(
            Arg::new("session")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("YAML replay file"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_parser(value_parser!(PathBuf))
                .help("TOML editor configuration"),
        )
        .arg(
            Arg::new("log-filter")
                .long("log-filter")
                .help("Tracing filter directive, used when RUST_LOG is unset"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .action(ArgAction::SetTrue)
                .help("Write logs to stderr as JSON lines"),
        )
        .arg(
            Arg::new("compact")
                .long("compact")
                .action(ArgAction::SetTrue)
                .help("Print the report on one line"),
        )
        .arg(
            Arg::new("fail-fast")
                .long("fail-fast")
                .action(ArgAction::SetTrue)
                .help("Stop at the first failed step"),
        )
        .arg(
            Arg::new("strict")
                .long("strict")
                .action(ArgAction::SetTrue)
                .help("Exit with an error if any step failed"),
        );

    let matches = cli.get_matches();

    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EditorConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EditorConfig::default(),
    };
    if let Some(filter) = matches.get_one::<String>("log-filter") {
        config = config.with_log_filter(filter.clone());
    }
    if matches.get_flag("json-logs") {
        config = config.with_log_format(LogFormat::Json);
    }
    init_tracing(&config.log);

    let path = matches
        .get_one::<PathBuf>("session")
        .context("missing session file")?;
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let script = ReplayScript::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    tracing::info!(
        podcasts = script.podcasts.len(),
        commands = script.commands.len(),
        "replaying session"
    );
    let report = replay(&script, &config, matches.get_flag("fail-fast")).await;

    let output = if matches.get_flag("compact") {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{output}");

    if matches.get_flag("strict") && !report.is_clean() {
        anyhow::bail!("{} step(s) failed", report.failures);
    }
    Ok(())
}
