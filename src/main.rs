use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use order_line_migrate::{
    config::{self, AppConfig, ConfigOverrides},
    data::{run_data_migration, AggregationStrategy, MigrationReport},
    db::{self, DbPool},
    errors::AppError,
    migrator::{self, Migrator},
};
use sea_orm::TransactionTrait;
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use tracing::info;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("error: {:#}", err);
        let code = err
            .downcast_ref::<AppError>()
            .map(AppError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

#[derive(Parser)]
#[command(
    name = "order-line-migrate",
    about = "Migrates order data from per-unit items to per-product lines",
    version
)]
struct Cli {
    #[arg(long, global = true, default_value = config::CONFIG_DIR, help = "Directory holding default.toml and the environment profiles")]
    config_dir: String,
    #[arg(long, global = true, help = "Database URL; overrides APP__DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, global = true, help = "PostgreSQL schema holding the tables")]
    schema: Option<String>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Emit logs as JSON lines"
    )]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending steps (structural, data, cleanup)
    Up(StepsArgs),
    /// Revert applied steps; only the structural step is reversible
    Down(StepsArgs),
    /// List applied and pending steps
    Status,
    /// Run only the data step against an already restructured schema
    Data(DataArgs),
}

#[derive(Args)]
struct StepsArgs {
    /// How many steps to apply or revert (at least 1)
    #[arg(long)]
    steps: Option<u32>,
}

#[derive(Args)]
struct DataArgs {
    #[arg(long, value_enum)]
    aggregation: Option<AggregationStrategy>,
    #[arg(long = "no-single-transaction", action = ArgAction::SetFalse)]
    single_transaction: bool,
}

struct StepStatus {
    name: String,
    applied: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let aggregation = match &cli.command {
        Commands::Data(args) => args.aggregation,
        _ => None,
    };
    let overrides = ConfigOverrides {
        database_url: cli.database_url.clone(),
        schema: cli.schema.clone(),
        log_json: cli.json_logs.then_some(true),
        aggregation,
    };
    let config = config::load_config_from(&cli.config_dir, &overrides)
        .map_err(AppError::from)
        .context("failed to load configuration")?;
    config::init_tracing(config.log_level(), config.log_json);

    let db = db::establish_connection_from_app_config(&config)
        .await
        .context("failed to connect to database")?;

    match cli.command {
        Commands::Up(args) => handle_up(&db, &config, args).await,
        Commands::Down(args) => handle_down(&db, args).await,
        Commands::Status => handle_status(&db).await,
        Commands::Data(args) => handle_data(&db, &config, args).await,
    }
}

async fn handle_up(db: &DbPool, config: &AppConfig, args: StepsArgs) -> Result<()> {
    migrator::configure(config.data_step_settings());
    db::run_migrations(db, args.steps)
        .await
        .context("failed to apply migrations")?;
    handle_status(db).await
}

async fn handle_down(db: &DbPool, args: StepsArgs) -> Result<()> {
    db::revert_migrations(db, args.steps)
        .await
        .context("failed to revert migrations")?;
    handle_status(db).await
}

async fn handle_status(db: &DbPool) -> Result<()> {
    let applied = Migrator::get_applied_migrations(db)
        .await
        .map_err(AppError::from)?;
    let pending = Migrator::get_pending_migrations(db)
        .await
        .map_err(AppError::from)?;

    let steps: Vec<StepStatus> = applied
        .iter()
        .map(|m| StepStatus {
            name: m.name().to_string(),
            applied: true,
        })
        .chain(pending.iter().map(|m| StepStatus {
            name: m.name().to_string(),
            applied: false,
        }))
        .collect();

    for step in &steps {
        let state = if step.applied { "applied" } else { "pending" };
        println!("{:<40} {}", step.name, state);
    }
    Ok(())
}

async fn handle_data(db: &DbPool, config: &AppConfig, args: DataArgs) -> Result<()> {
    let options = config.data_migration_options();
    let schema = config.schema.as_deref();

    let report: MigrationReport = if args.single_transaction {
        let txn = db.begin().await.map_err(AppError::from)?;
        let report = run_data_migration(&txn, schema, &options)
            .await
            .map_err(AppError::from)
            .context("data migration failed; transaction rolled back")?;
        txn.commit().await.map_err(AppError::from)?;
        report
    } else {
        run_data_migration(db, schema, &options)
            .await
            .map_err(AppError::from)
            .context("data migration failed")?
    };

    info!(order_lines = report.order_lines, "data migration committed");
    print_json(&report)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).map_err(AppError::from)?
    );
    Ok(())
}
