//! # kpi-prophet
//!
//! Command-line interface: run forecasts, cross-validate stored runs, manage
//! the ETL table and serve the web view.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use kpi_prophet::export::{latest_forecast_rows, write_forecast_csv};
use kpi_prophet::{
    router, run_all_forecasts, run_forecast, run_forecast_cross_validation, AppState, ProphetConfig,
    Stores,
};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "kpi-prophet")]
#[command(about = "Forecasting of configured KPIs", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "forecasts.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forecast of one metric
    Run {
        /// Metric name as configured
        metric: String,
    },

    /// Run every configured forecast
    RunAll,

    /// Cross-validate a stored forecast run
    CrossValidate {
        /// Id of the forecast run
        id: i64,

        /// Days predicted after each cutoff
        #[arg(long)]
        horizon_days: i64,

        /// Training days before the first cutoff (default: three horizons)
        #[arg(long)]
        initial_days: Option<i64>,

        /// Days between cutoffs (default: half a horizon)
        #[arg(long)]
        period_days: Option<i64>,
    },

    /// Drop and recreate the ETL forecast table
    CreateEtlTable,

    /// Write the latest predictions of a metric as CSV
    Export {
        /// Metric name
        metric: String,

        /// Output file (default: standard output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the web view
    Serve {
        /// Host to bind to (default: from the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: from the configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kpi_prophet=info,tower_http=info".into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = ProphetConfig::from_file(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    let stores = Stores::open(&config.database).context("opening databases")?;

    match cli.command {
        Commands::Run { metric } => {
            if let Some(id) = run_forecast(&config, &stores, &metric)? {
                println!("{}", id);
            }
        }
        Commands::RunAll => {
            for id in run_all_forecasts(&config, &stores)? {
                println!("{}", id);
            }
        }
        Commands::CrossValidate {
            id,
            horizon_days,
            initial_days,
            period_days,
        } => {
            if let Some(cv_id) =
                run_forecast_cross_validation(&stores, id, horizon_days, initial_days, period_days)?
            {
                println!("{}", cv_id);
            }
        }
        Commands::CreateEtlTable => {
            let Some(table) = &config.database.forecast_table_name else {
                bail!("no forecast_table_name configured");
            };
            stores.source.create_forecast_table(table)?;
        }
        Commands::Export { metric, output } => {
            let Some(rows) = latest_forecast_rows(&stores.metadata, &metric)? else {
                bail!("no forecast stored for {}", metric);
            };
            match output {
                Some(path) => {
                    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
                    write_forecast_csv(&rows, BufWriter::new(file))?;
                }
                None => write_forecast_csv(&rows, io::stdout().lock())?,
            }
        }
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let app = router(AppState::new(config, stores));

            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("binding {}:{}", host, port))?;
            info!("kpi-prophet v{} listening on {}:{}", kpi_prophet::VERSION, host, port);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
