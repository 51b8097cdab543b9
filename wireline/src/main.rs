#![allow(dead_code)]

use crate::app::App;
use crate::config::RelayConfig;
use crate::proxy::NetworkAddr;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

mod app;
mod common;
mod config;
mod external;
mod network;
mod proxy;
mod relay;

#[derive(Debug, Parser)]
#[command(name = "wireline", about = "Transparent TCP relay")]
struct ProgramArgs {
    /// Address to listen on, e.g. 0.0.0.0:3131
    #[arg(short, long)]
    listen: Option<SocketAddr>,
    /// Upstream to relay to, e.g. db.internal:3306
    #[arg(short, long)]
    target: Option<NetworkAddr>,
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Log filter directive, e.g. "wireline=debug"
    #[arg(long, default_value = "wireline=info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = ProgramArgs::parse();
    let config = match RelayConfig::load(args.config.as_deref(), args.listen, args.target) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load config: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = external::init_tracing(&args.log_level) {
        eprintln!("{}", err);
        return ExitCode::FAILURE;
    }
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Failed to create tokio runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };
    rt.block_on(async {
        match App::create(config).await {
            Ok(app) => {
                app.run().await;
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!("{:#}", err);
                ExitCode::FAILURE
            }
        }
    })
}
