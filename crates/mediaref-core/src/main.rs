//! `mediaref` command line

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use mediaref_core::{MediaPipeline, PipelineConfig};
use mediaref_queue::{ProgressCallback, QueueItem};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn input_arg() -> Arg {
    Arg::new("input")
        .required(true)
        .value_parser(clap::value_parser!(PathBuf))
        .help("Document to read, `-` for stdin")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Write the result here instead of stdout")
}

fn cli() -> Command {
    Command::new("mediaref")
        .version(mediaref_core::VERSION)
        .about("Resolve media placeholders and manage asset references")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("TOML config file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve every placeholder in a document and compress it")
                .arg(input_arg())
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("expand")
                .about("Replace asset references with their payloads")
                .arg(input_arg())
                .arg(output_arg()),
        )
        .subcommand(
            Command::new("compress")
                .about("Replace inline payloads with asset references")
                .arg(input_arg())
                .arg(output_arg()),
        )
        .subcommand(Command::new("sweep").about("Evict expired and over-cap assets"))
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<PipelineConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading {}", path.display())),
        None => {
            let mut config = PipelineConfig::default();
            config.apply_env();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        use tokio::io::AsyncReadExt;
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("reading stdin")?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn write_output(path: Option<&PathBuf>, text: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => tokio::fs::write(path, text)
            .await
            .with_context(|| format!("writing {}", path.display())),
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(text.as_bytes()).await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}

async fn run(matches: ArgMatches) -> anyhow::Result<()> {
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("show-config", _)) => {
            print!("{}", config.redacted().to_toml_string()?);
        }
        Some(("resolve", sub)) => {
            let pipeline = MediaPipeline::from_config(config).await?;
            let doc = read_input(required_path(sub)?).await?;
            let progress: ProgressCallback = Arc::new(|index: usize, total: usize, item: &QueueItem| {
                tracing::info!(
                    index,
                    total,
                    status = ?item.status,
                    description = %item.descriptor.description,
                    "placeholder processed"
                );
            });
            let resolved = pipeline.resolve_document(&doc, Some(progress)).await;
            let stats = resolved.stats();
            tracing::info!(
                completed = stats.completed,
                failed = stats.failed,
                stored = resolved.report.stored,
                deduplicated = resolved.report.deduplicated,
                unpersisted = resolved.report.unpersisted,
                "document resolved"
            );
            write_output(sub.get_one::<PathBuf>("output"), &resolved.document).await?;
        }
        Some(("expand", sub)) => {
            let pipeline = MediaPipeline::from_config(config).await?;
            let doc = read_input(required_path(sub)?).await?;
            write_output(sub.get_one::<PathBuf>("output"), &pipeline.expand(&doc)).await?;
        }
        Some(("compress", sub)) => {
            let pipeline = MediaPipeline::from_config(config).await?;
            let doc = read_input(required_path(sub)?).await?;
            let (compressed, report) = pipeline.compress(&doc).await;
            tracing::info!(
                substituted = report.substituted(),
                skipped = report.skipped,
                unpersisted = report.unpersisted,
                "document compressed"
            );
            write_output(sub.get_one::<PathBuf>("output"), &compressed).await?;
        }
        Some(("sweep", _)) => {
            let pipeline = MediaPipeline::from_config(config).await?;
            let report = pipeline.sweep().await?;
            println!("expired: {}, evicted: {}", report.expired, report.evicted);
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}

fn required_path(matches: &ArgMatches) -> anyhow::Result<&PathBuf> {
    matches
        .get_one::<PathBuf>("input")
        .context("missing input path")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));
    run(matches).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let matches = cli()
            .try_get_matches_from(["mediaref", "resolve", "page.html", "-o", "out.html", "--json"])
            .unwrap();
        assert!(matches.get_flag("json"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "resolve");
        assert_eq!(sub.get_one::<PathBuf>("input").unwrap(), &PathBuf::from("page.html"));
        assert_eq!(sub.get_one::<PathBuf>("output").unwrap(), &PathBuf::from("out.html"));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(cli().try_get_matches_from(["mediaref"]).is_err());
    }
}
