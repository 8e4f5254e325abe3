use anyhow::Result;
use clap::Parser;
use fusion_lib::config::PipelineConfig;
use fusion_lib::pipeline::Pipeline;
use log::info;
use std::path::PathBuf;
use std::time::Instant;
use uuid::Uuid;

/// Fuse the spreadsheet and map exports into one GeoJSON collection.
#[derive(Parser, Debug)]
#[command(name = "fuse", about = "Singapore toilet/bidet location fusion pipeline")]
struct Cli {
    /// Ignore cached source data and fetch everything fresh.
    #[arg(long)]
    force_refresh: bool,

    /// Stop after writing combined.geojson; skip geocoding and synthetic
    /// fields.
    #[arg(long)]
    skip_enrichment: bool,

    /// Run without network access, from cached source data only.
    #[arg(long)]
    offline: bool,

    /// Output directory for the data files (default: ./data).
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    info!("Starting location fusion pipeline");

    let mut config = PipelineConfig::from_env();
    config.force_refresh = cli.force_refresh;
    config.enrich = !cli.skip_enrichment;
    config.offline = cli.offline;
    if let Some(dir) = cli.data_dir {
        config.cache_dir = dir.join("cache");
        config.data_dir = dir;
    }
    config.log_config();

    let run_id = Uuid::new_v4().to_string();
    info!("Run ID: {}", run_id);

    let start = Instant::now();
    let pipeline = Pipeline::new(config);
    let stats = pipeline.run(&run_id).await?;

    stats.log_summary();
    info!("Total execution time: {:.2?}", start.elapsed());
    info!("Pipeline completed successfully!");
    Ok(())
}
