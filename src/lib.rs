pub mod app;
pub mod cart;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod inventory;
pub mod lifecycle;
pub mod messaging;
pub mod metrics;
pub mod rpc;
pub mod storage;
pub mod telemetry;
pub mod utils;
