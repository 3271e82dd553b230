use anyhow::Result;
use transcribe_configuration::{load_config, setup_logging};
use transcribe_setup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    setup_logging(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "transcribe-service starting");
    let app = Application::new(config).await?;
    app.run().await?;
    Ok(())
}
