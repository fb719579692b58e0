//! Invoice pipeline server binary.
//!
//! Reads `.env` when present, then `server.*` / `INVOICE_SERVER__*` and
//! `pipeline.*` / `PIPELINE__*`.

use invoice_pipeline::PipelineConfig;
use server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ServerConfig::load()?;
    let pipeline = PipelineConfig::load()?;

    server::start_server(config, pipeline).await?;

    Ok(())
}
