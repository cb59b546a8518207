use clap::Parser;
use stockcart::config::StocksConfig;
use stockcart::{app, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = StocksConfig::parse();
    telemetry::init(telemetry::DEFAULT_FILTER);

    app::run_stocks(config).await
}
