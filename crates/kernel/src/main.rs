//! Tabula command-line tool.
//!
//! Runs one table request against a PostgreSQL base query and prints the
//! result envelope as JSON.
//!
//! Usage:
//!   tabula --sql "SELECT year, summary FROM document" --request request.json
//!   tabula --sql "SELECT year, summary FROM document" --query-string "start=0&length=10"
//!   tabula check --sql "SELECT year, summary FROM document"

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tabula_kernel::{AdHocTable, Config, PgBackend, PgQuery, db};

/// Filter, sort and page a base query from a table request.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Introspect the base query and print its classified columns.
    Check {
        /// Base query. Every projected column must be named.
        #[arg(long)]
        sql: String,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Base query. Every projected column must be named.
    #[arg(long)]
    sql: Option<String>,

    /// JSON request payload file.
    #[arg(long, conflicts_with = "query_string")]
    request: Option<PathBuf>,

    /// Flattened request, e.g. `columns[0][search][value]=tax&start=0`.
    #[arg(long)]
    query_string: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    let pool = db::create_pool(&config).await?;
    db::ensure_responsive(&pool).await?;
    let backend = PgBackend::from_config(pool, &config);

    match cli.command {
        Some(Command::Check { sql }) => check(&backend, sql).await,
        None => serve(&backend, &config, cli.serve).await,
    }
}

async fn check(backend: &PgBackend, sql: String) -> Result<()> {
    let table = AdHocTable::introspect(backend, PgQuery::from_sql(sql))
        .await
        .context("failed to register base query")?;

    for column in table.columns() {
        println!("{}\t{}", column.name, column.classification);
    }
    Ok(())
}

async fn serve(backend: &PgBackend, config: &Config, args: ServeArgs) -> Result<()> {
    let Some(sql) = args.sql else {
        bail!("--sql is required");
    };

    let table = AdHocTable::introspect(backend, PgQuery::from_sql(sql))
        .await
        .context("failed to register base query")?
        .with_limits(config.page_limits());

    let envelope = match (args.request, args.query_string) {
        (Some(path), _) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let payload: serde_json::Value =
                serde_json::from_str(&text).context("request file is not valid JSON")?;
            table.respond_json(backend, &payload).await
        }
        (None, Some(query)) => table.respond_query_string(backend, &query).await,
        (None, None) => table.respond_json(backend, &serde_json::json!({})).await,
    }
    .context("failed to execute table query")?;

    info!(
        records_total = envelope.records_total,
        records_filtered = envelope.records_filtered,
        returned = envelope.data.len(),
        "table request served"
    );

    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
