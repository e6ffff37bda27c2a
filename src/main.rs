use clap::Parser;
use colored::*;
use log::{error, warn};

use rsrecon::input::Opts;
use rsrecon::logger::init_logger;
use rsrecon::ReconEngine;

const BANNER: &str = r#"

   _ __ ___ _ __ ___  ___ ___  _ __
  | '__/ __| '__/ _ \/ __/ _ \| '_ \
  | |  \__ \ | |  __/ (_| (_) | | | |
  |_|  |___/_|  \___|\___\___/|_| |_|

"#;

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    init_logger(opts.log_level());

    if !opts.silent {
        print_banner();
    }

    let config = match opts.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let engine = match ReconEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = engine.check_tools() {
        error!("{}", e);
        std::process::exit(1);
    }

    // Ctrl-C 只停止派发新任务，已写出的产物保留
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Reconnaissance interrupted by user");
            cancel.cancel();
        }
    });

    match engine.run().await {
        Ok(summary) => {
            summary.print_summary();
            if summary.interrupted {
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn print_banner() {
    println!("{}", BANNER.bright_cyan());
    let title = format!(
        "rsrecon v{} - Subdomain Enum • DNS Bruteforce • URL Probing",
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", title.bright_green());
    println!("{}", "=".repeat(60).bright_yellow());
}
