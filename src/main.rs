//! # Statship — Scheduled Analytics Report Dispatcher
//!
//! Fetches website stats from an analytics instance and delivers them on a
//! schedule to email and chat webhooks, at most once per channel per day.
//!
//! Usage:
//!   statship serve                # Start the scheduler loop
//!   statship run 3                # Run job 3 now, bypassing the daily guard
//!   statship next 3 --count 5     # Show the next 5 scheduled runs for job 3
//!   statship jobs                 # List configured jobs
//!   statship add-job ...          # Create a job (see --help for the rest)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{NaiveTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use statship_channels::{HttpWebhookTransport, SmtpEmailTransport};
use statship_core::config::StatshipConfig;
use statship_core::error::StatshipError;
use statship_core::types::{Frequency, Instance, Job, ReportType, Sender, WebhookRecipient};
use statship_report::HttpSummarySource;
use statship_scheduler::{Dispatcher, SchedulerDb, project_next_runs, run_scheduler};

#[derive(Parser)]
#[command(
    name = "statship",
    version,
    about = "📊 Statship — scheduled analytics reports to email and chat webhooks"
)]
struct Cli {
    /// Path to the config file (default: ~/.statship/config.toml)
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the scheduler loop
    Serve,
    /// Run a job immediately, bypassing the same-day guard
    Run {
        /// Job ID
        id: i64,
    },
    /// Show upcoming scheduled runs for a job
    Next {
        /// Job ID
        id: i64,
        /// Number of runs to project
        #[arg(long, default_value = "3")]
        count: usize,
    },
    /// List configured jobs
    Jobs,
    /// Create a report job
    AddJob {
        /// Job name (doubles as the report title and email subject)
        name: String,
        /// Website id on the analytics instance
        website_id: String,
        /// Analytics instance ID
        #[arg(long, default_value = "1")]
        instance: i64,
        /// daily | weekly | monthly
        #[arg(long)]
        frequency: String,
        /// Time of day in UTC, "HH:MM" or "HH:MM:SS"
        #[arg(long)]
        time: String,
        /// Weekday 0-6 (Monday = 0) for weekly, day of month 1-31 for monthly
        #[arg(long)]
        day: Option<u32>,
        /// Sender ID for the email channel
        #[arg(long)]
        sender: Option<i64>,
        /// Email recipient (repeatable)
        #[arg(long)]
        email: Vec<String>,
        /// Webhook recipient ID (repeatable)
        #[arg(long)]
        webhook: Vec<i64>,
        /// Timezone used in the report period text
        #[arg(long, default_value = "Europe/Berlin")]
        timezone: String,
        /// Metric to include, e.g. pageviews (repeatable; empty = all)
        #[arg(long)]
        item: Vec<String>,
    },
    /// Delete a job and its run history
    RemoveJob {
        /// Job ID
        id: i64,
    },
    /// Register an SMTP sender account
    AddSender {
        name: String,
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "587")]
        port: u16,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// From address, e.g. "Reports <reports@example.com>"
        #[arg(long)]
        from: String,
    },
    /// Register an analytics instance
    AddInstance {
        name: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
    },
    /// Register a webhook recipient
    AddWebhook {
        name: String,
        #[arg(long)]
        url: String,
        /// DISCORD | TEAMS | anything else for generic JSON
        #[arg(long, default_value = "WEBHOOK")]
        kind: String,
    },
}

fn parse_time(s: &str) -> statship_core::error::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|e| StatshipError::Config(format!("Invalid time '{s}': {e}")))
}

fn build_dispatcher(db: &Arc<SchedulerDb>, config: &StatshipConfig) -> Dispatcher {
    let summary_timeout = Duration::from_secs(config.delivery.summary_timeout_secs);
    let send_timeout = Duration::from_secs(config.delivery.send_timeout_secs);

    let resolver_db = db.clone();
    let summary = HttpSummarySource::new(
        summary_timeout,
        Arc::new(move |id| resolver_db.get_instance(id).ok().flatten()),
    );

    Dispatcher::new(
        Arc::new(summary),
        Arc::new(SmtpEmailTransport::new(send_timeout)),
        Arc::new(HttpWebhookTransport::new(send_timeout)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "statship=debug"
    } else {
        "statship=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => StatshipConfig::load_from(path)?,
        None => StatshipConfig::load()?,
    };

    let db_path = std::path::PathBuf::from(&config.database_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(SchedulerDb::open(&db_path)?);

    match cli.command {
        Command::Serve => {
            println!("📊 Statship v{}", env!("CARGO_PKG_VERSION"));
            println!("   🗄️  Database: {}", config.database_path);
            println!(
                "   ⏰ Tick:     every {}s",
                config.scheduler.tick_interval_secs
            );
            println!();

            let dispatcher = Arc::new(build_dispatcher(&db, &config));
            run_scheduler(db, dispatcher, config.scheduler.tick_interval_secs).await;
        }
        Command::Run { id } => {
            let job = db
                .get_job(id)?
                .ok_or_else(|| StatshipError::NotFound(format!("No job with ID {id}")))?;
            println!("🚀 Running job '{}' now (guard bypassed)...", job.name);

            let dispatcher = build_dispatcher(&db, &config);
            dispatcher
                .process_jobs(&db, std::slice::from_ref(&job), Utc::now(), true)
                .await;

            if let Some(run) = db.recent_runs(Some(id), 1)?.first() {
                println!(
                    "🏁 Run #{}: {} ({} ok / {} failed / {} skipped)",
                    run.id, run.status, run.count_success, run.count_failed, run.count_skipped
                );
            }
        }
        Command::Next { id, count } => {
            let job = db
                .get_job(id)?
                .ok_or_else(|| StatshipError::NotFound(format!("No job with ID {id}")))?;
            println!("📅 Next runs for '{}' ({}):", job.name, job.frequency);
            for at in project_next_runs(&job, Utc::now(), count) {
                println!("   {}", at.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        Command::Jobs => {
            let jobs = db.list_jobs()?;
            if jobs.is_empty() {
                println!("No jobs configured.");
                return Ok(());
            }
            for job in &jobs {
                let state = if job.is_active { "✅" } else { "⏸️" };
                let next = project_next_runs(job, Utc::now(), 1)
                    .first()
                    .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "never".into());
                println!(
                    "{state} #{} '{}' — {} at {} | next: {next}",
                    job.id,
                    job.name,
                    job.frequency,
                    job.execution_time.format("%H:%M")
                );
            }
        }
        Command::AddJob {
            name,
            website_id,
            instance,
            frequency,
            time,
            day,
            sender,
            email,
            webhook,
            timezone,
            item,
        } => {
            let frequency = Frequency::parse(&frequency)
                .ok_or_else(|| StatshipError::Config(format!("Unknown frequency '{frequency}'")))?;
            let job = Job {
                id: 0,
                name,
                sender_id: sender,
                instance_id: instance,
                website_id,
                report_type: ReportType::Summary,
                summary_items: item,
                report_id: None,
                frequency,
                day,
                execution_time: parse_time(&time)?,
                email_recipients: email,
                webhook_recipients: webhook,
                timezone,
                is_active: true,
                created_at: Utc::now(),
            };
            let id = db.save_job(&job)?;
            println!("📅 Job '{}' added with ID {id}", job.name);
        }
        Command::RemoveJob { id } => {
            db.delete_job(id)?;
            println!("🗑️  Job {id} removed (run history included)");
        }
        Command::AddSender {
            name,
            host,
            port,
            username,
            password,
            from,
        } => {
            let id = db.save_sender(&Sender {
                id: 0,
                name,
                smtp_host: host,
                smtp_port: port,
                username,
                password,
                from_address: from,
            })?;
            println!("📧 Sender added with ID {id}");
        }
        Command::AddInstance { name, url, token } => {
            let id = db.save_instance(&Instance {
                id: 0,
                name,
                base_url: url,
                api_token: token,
            })?;
            println!("📈 Instance added with ID {id}");
        }
        Command::AddWebhook { name, url, kind } => {
            let id = db.save_webhook(&WebhookRecipient {
                id: 0,
                name,
                url,
                kind: kind.to_uppercase(),
            })?;
            println!("🔗 Webhook added with ID {id}");
        }
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
    fn test_add_job_args_parse() {
        let cli = Cli::parse_from([
            "statship",
            "add-job",
            "Weekly traffic",
            "site-1",
            "--frequency",
            "weekly",
            "--time",
            "08:00",
            "--day",
            "2",
            "--sender",
            "1",
            "--email",
            "ops@example.com",
            "--webhook",
            "7",
        ]);
        match cli.command {
            Command::AddJob {
                name,
                website_id,
                frequency,
                day,
                webhook,
                ..
            } => {
                assert_eq!(name, "Weekly traffic");
                assert_eq!(website_id, "site-1");
                assert_eq!(frequency, "weekly");
                assert_eq!(day, Some(2));
                assert_eq!(webhook, vec![7]);
            }
            _ => panic!("expected add-job"),
        }
    }

    #[test]
    fn test_parse_time_accepts_minutes_and_seconds() {
        assert_eq!(
            parse_time("08:00").unwrap(),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap()
        );
        assert_eq!(
            parse_time("23:59:30").unwrap(),
            NaiveTime::from_hms_opt(23, 59, 30).unwrap()
        );
        assert!(parse_time("8am").is_err());
    }
}
