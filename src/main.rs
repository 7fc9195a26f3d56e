use clap::Parser;
use env_logger::Env;

use seo_dashboard::app;
use seo_dashboard::config::Config;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Parse command-line arguments and environment
    let config = Config::parse();

    // Start the web application
    app::run(config).await?;

    Ok(())
}
