use bill_cost_alert::interpreter::{CostModel, OpenAiCostModel};
use bill_cost_alert::mailer::build_mailer;
use bill_cost_alert::{scheduler, AppConfig, DedupStore, Pipeline};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "bill-cost-alert",
    about = "Watches newly filed congressional bills and emails subscribers when a CBO cost estimate crosses the alert threshold"
)]
struct Args {
    /// Run a single pipeline cycle and exit instead of scheduling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    info!("starting bill-cost-alert");

    let dedup = Arc::new(Mutex::new(
        DedupStore::load(config.processed_path.clone()).await,
    ));
    let model: Arc<dyn CostModel> = Arc::new(OpenAiCostModel::new(&config.extraction)?);
    let mailer = build_mailer(&config.mail.provider)?;
    info!("alert delivery via {}", mailer.provider_name());

    let pipeline = Pipeline::new(&config, model, mailer, dedup)?;

    if args.once {
        info!("running a single cycle");
        pipeline.run_cycle().await?;
        return Ok(());
    }

    let pipeline = &pipeline;
    tokio::select! {
        _ = scheduler::run(config.cycle_interval, || pipeline.run_cycle()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested, abandoning any in-flight cycle without commit");
        }
    }
    Ok(())
}
