use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use crate::api::ReconConfig;
use crate::error::{ReconError, Result};

#[derive(Parser, Debug)]
#[command(name = "rsrecon")]
#[command(author = "o0x1024")]
#[command(version)]
#[command(
    about = "Automate reconnaissance: passive enumeration, DNS bruteforce, URL probing, screenshots and parameter discovery",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Opts {
    /// target domain to enumerate
    pub domain: String,

    /// number of threads for passive enumeration and DNS bruteforce
    #[arg(short, long, default_value_t = 40)]
    pub threads: usize,

    /// directory to store results
    #[arg(short, long, default_value = "recon_output")]
    pub output: PathBuf,

    /// number of threads for Arjun
    #[arg(long, default_value_t = 10)]
    pub arjun_threads: usize,

    /// number of concurrent hosts for URL probing
    #[arg(long, default_value_t = 10)]
    pub probe_threads: usize,

    /// skip GoWitness screenshot capture
    #[arg(long)]
    pub skip_gowitness: bool,

    /// skip Arjun parameter discovery
    #[arg(long)]
    pub skip_arjun: bool,

    /// skip passive enumeration (Sublist3r no longer required)
    #[arg(long)]
    pub skip_passive: bool,

    /// wordlist file for DNS bruteforce (enables bruteforce mode)
    #[arg(short, long)]
    pub wordlist: Option<PathBuf>,

    /// limit wordlist to first N entries
    #[arg(long, default_value_t = 5000)]
    pub wordlist_limit: usize,

    /// DNS query timeout in seconds
    #[arg(long, default_value_t = 2.0)]
    pub dns_timeout: f64,

    /// write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// show debug output
    #[arg(short, long)]
    pub verbose: bool,

    /// only show warnings and errors, no banner
    #[arg(short, long, conflicts_with = "verbose")]
    pub silent: bool,
}

impl Opts {
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.silent {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }

    /// 转换为库配置并校验
    pub fn into_config(self) -> Result<ReconConfig> {
        let dns_timeout = parse_timeout(self.dns_timeout)?;
        let config = ReconConfig {
            domain: self.domain,
            output_dir: self.output,
            wordlist: self.wordlist,
            wordlist_limit: self.wordlist_limit,
            threads: self.threads,
            dns_timeout,
            probe_threads: self.probe_threads,
            arjun_threads: self.arjun_threads,
            skip_passive: self.skip_passive,
            skip_gowitness: self.skip_gowitness,
            skip_arjun: self.skip_arjun,
            report: self.report,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// 秒数转换为超时时长，必须为正数
pub fn parse_timeout(seconds: f64) -> Result<Duration> {
    if seconds.is_finite() && seconds > 0.0 {
        Ok(Duration::from_secs_f64(seconds))
    } else {
        Err(ReconError::InvalidConfig(format!("无效的超时时间: {}", seconds)))
    }
}
