use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use timekeeper_import::{
    ConfigProvider, EnvProvider, ImportService, RowSource, TimekeeperClient, TimekeeperConfig,
    YamlFileProvider, helpers::calendar,
};

#[derive(Parser)]
#[command(name = "timekeeper-import", about = "Import timesheet CSV files into Timekeeper")]
struct Cli {
    /// YAML config; environment variables are used when omitted
    #[arg(long, env = "TIMEKEEPER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import every row of a headerless CSV file
    Import {
        file: PathBuf,
        #[arg(long)]
        actor: String,
        /// Defaults to the last Friday
        #[arg(long)]
        date: Option<String>,
    },
    /// List tasks recorded for an actor
    Tasks {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Delete a task by id
    Delete {
        task_id: String,
        #[arg(long)]
        actor: String,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<TimekeeperConfig> {
    let config = match path {
        Some(path) => YamlFileProvider::new(path).load()?,
        None => EnvProvider::new().load()?,
    };
    Ok(config)
}

fn parse_date(date: &str) -> anyhow::Result<NaiveDate> {
    calendar::parse_date_str(date).with_context(|| format!("bad date argument '{}'", date))
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(cli.config).context("Failed to load Timekeeper config")?;
    let client = TimekeeperClient::new(config)?;

    match cli.command {
        Command::Import { file, actor, date } => {
            let date = date.as_deref().map(parse_date).transpose()?;
            let service = ImportService::new(client);
            let report = service
                .import_file(&RowSource::new(&file), &actor, date)
                .await
                .with_context(|| format!("Import of {} aborted", file.display()))?;

            for outcome in report.exhausted() {
                error!(
                    "Entry {} failed after {} attempts. Response code: {:?}",
                    outcome.entry, outcome.attempts_used, outcome.http_status
                );
                error!("Response body: {}", outcome.response_body);
            }
            if report.succeeded() {
                info!("Imported {} entries successfully", report.outcomes.len());
            }
            Ok(report.succeeded())
        }
        Command::Tasks { actor, start, end } => {
            let tasks = client
                .get_tasks(&actor, parse_date(&start)?, parse_date(&end)?)
                .await?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
            Ok(true)
        }
        Command::Delete { task_id, actor } => {
            client.delete_task(&task_id, &actor).await?;
            Ok(true)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
