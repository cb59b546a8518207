use clap::Parser;
use stockcart::config::CartConfig;
use stockcart::{app, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = CartConfig::parse();
    telemetry::init(telemetry::DEFAULT_FILTER);

    app::run_cart(config).await
}
