use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wellbeing_analytics::aggregate::SegmentFilter;
use wellbeing_analytics::config::AnalyticsConfig;
use wellbeing_analytics::dashboard::Dashboard;
use wellbeing_analytics::db;
use wellbeing_analytics::report::{self, ReportOptions};
use wellbeing_analytics::seed::SeedOutcome;
use wellbeing_analytics::store::{FileStore, KeyValueStore, RecordStore};

#[derive(Parser)]
#[command(name = "wellbeing-analytics")]
#[command(
    about = "Issue prevalence, segmentation and funnel analytics for wellbeing questionnaires",
    long_about = None
)]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// JSON document holding the collections (overrides the config file)
    #[arg(long, global = true, conflicts_with = "postgres")]
    store: Option<PathBuf>,
    /// Use the Postgres instance at DATABASE_URL instead of a file
    #[arg(long, global = true)]
    postgres: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the Postgres schema
    InitDb,
    /// Generate mock users unless enough already exist
    Seed {
        #[arg(long)]
        threshold: Option<usize>,
        /// Fixed RNG seed for reproducible data
        #[arg(long)]
        rng_seed: Option<u64>,
    },
    /// Headline user and completion numbers
    Overview,
    /// Most common issues
    Top {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Average answer time per question, slowest first
    Difficulty {
        /// Use timing maps stored on user records instead of the global samples
        #[arg(long)]
        from_records: bool,
    },
    /// Visit, start and completion conversion
    Funnel,
    /// Issue counts by age and profession
    Segments {
        #[arg(long, default_value = "all")]
        age: String,
        #[arg(long, default_value = "all")]
        profession: String,
        /// Also write the cross-tabs as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "all")]
        age: String,
        #[arg(long, default_value = "all")]
        profession: String,
        #[arg(long, default_value = "analytics-report.md")]
        out: PathBuf,
    },
    /// Delete every analytics collection and session key
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Delete the funnel counters only
    ResetFunnel {
        #[arg(long)]
        yes: bool,
    },
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Seed { .. } | Commands::Reset { .. } | Commands::ResetFunnel { .. }
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("wellbeing_analytics=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AnalyticsConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    if !cli.postgres {
        if matches!(cli.command, Commands::InitDb) {
            bail!("init-db requires --postgres");
        }
        let path = cli.store.clone().unwrap_or_else(|| config.store_path.clone());
        let mut dashboard = Dashboard::new(RecordStore::new(FileStore::new(path)));
        return run(&mut dashboard, &cli.command, &config);
    }

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set when using --postgres")?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    if matches!(cli.command, Commands::InitDb) {
        db::init_db(&pool).await?;
        println!("Schema ready.");
        return Ok(());
    }

    let snapshot = db::load_snapshot(&pool).await?;
    let mut dashboard = Dashboard::new(RecordStore::new(snapshot));
    run(&mut dashboard, &cli.command, &config)?;

    if cli.command.mutates() {
        db::save_snapshot(&pool, dashboard.store().backend()).await?;
    }
    Ok(())
}

fn run<S: KeyValueStore>(
    dashboard: &mut Dashboard<S>,
    command: &Commands,
    config: &AnalyticsConfig,
) -> anyhow::Result<()> {
    match command {
        Commands::InitDb => bail!("init-db requires --postgres"),
        Commands::Seed {
            threshold,
            rng_seed,
        } => {
            let threshold = threshold.unwrap_or(config.seed_threshold);
            let mut rng = match rng_seed {
                Some(seed) => StdRng::seed_from_u64(*seed),
                None => StdRng::from_entropy(),
            };
            let now_ms = chrono::Utc::now().timestamp_millis();
            let prefix = &config.mock_email_prefix;
            match dashboard.seed_if_needed(threshold, prefix, now_ms, &mut rng)? {
                SeedOutcome::AlreadySeeded { mock_users } => {
                    println!("Already seeded ({mock_users} mock users).")
                }
                SeedOutcome::Seeded { users } => println!("Seeded {users} mock users."),
            }
        }
        Commands::Overview => {
            let context = dashboard.load_all()?;
            let overview = context.overview();
            println!("Total users: {}", overview.total_users);
            println!("Completed assessments: {}", overview.completed_assessments);
            println!("Completion rate: {}%", overview.completion_rate);
            println!(
                "Average time per question: {} min",
                overview.avg_minutes_per_question
            );
            if let Some(alert) = context.awareness_alert(config.alert_threshold) {
                println!("Alert: {} is affecting {} users.", alert.name, alert.count);
            }
        }
        Commands::Top { limit } => {
            let limit = limit.unwrap_or(config.top_n);
            let top = dashboard.load_all()?.top_issues(limit);
            if top.is_empty() {
                println!("No issues recorded yet.");
                return Ok(());
            }
            println!("Top {limit} issues:");
            for (rank, issue) in top.iter().enumerate() {
                println!("#{} {} ({} users)", rank + 1, issue.name, issue.count);
            }
        }
        Commands::Difficulty { from_records } => {
            let context = dashboard.load_all()?;
            let difficulty = if *from_records {
                context.question_difficulty_from_records()
            } else {
                context.question_difficulty()
            };
            for question in difficulty {
                println!(
                    "Q{} {}: {}s avg",
                    question.question_id, question.label, question.average_seconds
                );
            }
        }
        Commands::Funnel => {
            let funnel = dashboard.load_all()?.funnel_steps();
            if !funnel.has_data {
                println!("No funnel data available yet.");
                return Ok(());
            }
            for anomaly in &funnel.anomalies {
                warn!(%anomaly, "funnel counters out of order");
            }
            for (index, step) in funnel.steps.iter().enumerate() {
                match step.conversion_pct {
                    None => println!("{}: {} users (baseline)", step.label, step.value),
                    Some(pct) => println!(
                        "{}: {} users, {}% conversion, {} dropped off before",
                        step.label,
                        step.value,
                        pct,
                        funnel.steps[index.saturating_sub(1)].dropoff
                    ),
                }
            }
        }
        Commands::Segments {
            age,
            profession,
            csv,
        } => {
            let filter = SegmentFilter::parse(Some(age.as_str()), Some(profession.as_str()));
            let result = dashboard.load_all()?.aggregate(&filter);
            println!(
                "{} records match {}",
                result.records_considered,
                filter.describe()
            );
            for (title, table) in [
                ("By age", &result.issues_by_age),
                ("By profession", &result.issues_by_profession),
            ] {
                println!("{title}:");
                for (label, counts) in table.iter() {
                    println!("  {label} (total {})", counts.total());
                    for (issue, count) in counts.in_first_seen_order() {
                        println!("    {issue}: {count}");
                    }
                }
            }
            if let Some(path) = csv {
                let file = std::fs::File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report::write_segments_csv(file, &result)?;
                println!("Cross-tabs written to {}.", path.display());
            }
        }
        Commands::Report {
            age,
            profession,
            out,
        } => {
            let filter = SegmentFilter::parse(Some(age.as_str()), Some(profession.as_str()));
            let context = dashboard.load_all()?;
            let report = report::build_report(
                context,
                &ReportOptions {
                    filter: &filter,
                    top_n: config.top_n,
                    alert_threshold: config.alert_threshold,
                    generated_at: chrono::Utc::now(),
                },
            );
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("reset deletes all analytics data; rerun with --yes to confirm");
            }
            dashboard.reset_all()?;
            info!("analytics data reset");
            println!("All 5 analytics data sources have been reset.");
        }
        Commands::ResetFunnel { yes } => {
            if !yes {
                bail!("reset-funnel deletes the funnel counters; rerun with --yes to confirm");
            }
            dashboard.reset_funnel()?;
            println!("Funnel data has been reset.");
        }
    }
    Ok(())
}
