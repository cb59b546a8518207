use clap::Parser;
use stockcart::config::ConsumerConfig;
use stockcart::{app, telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsumerConfig::parse();
    telemetry::init("info,stockcart=debug,rdkafka=warn");

    app::run_consumer(config).await
}
