//! # rsrecon
//!
//! 自动化侦察流水线：被动子域名枚举、DNS暴破、HTTP/HTTPS存活探测，
//! 以及截图（gowitness）和参数发现（arjun）等外部工具的调度。
//!
//! ## 流程
//!
//! `Enumerate -> Probe -> GoWitness -> Arjun -> Done`
//!
//! - 每个阶段结束后产物文件一定存在（`subdomains.txt`、`urls.txt`），即使为空
//! - 单个DNS查询或HTTP请求失败只会被丢弃，不会中断流程
//! - 外部工具缺失时对应阶段被跳过
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use rsrecon::{run_recon, ReconConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = ReconConfig::new("example.com");
//!     config.wordlist = Some("wordlist.txt".into());
//!     config.skip_gowitness = true;
//!
//!     let summary = run_recon(config).await?;
//!     println!("发现 {} 个子域名, {} 个存活URL", summary.subdomains, summary.live_urls);
//!     Ok(())
//! }
//! ```
//!
//! ## 自定义组件
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rsrecon::{DnsResolver, DomainVerifier, ReconConfig, ReconEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReconConfig::new("example.com");
//!     let lookup = Arc::new(DnsResolver::new(Duration::from_secs(1)));
//!     let prober = Arc::new(DomainVerifier::new(Duration::from_secs(3), Duration::from_secs(5))?);
//!
//!     let engine = ReconEngine::with_components(config, lookup, prober)?;
//!     let summary = engine.run().await?;
//!     summary.print_summary();
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod collector;
pub mod dns_resolver;
pub mod error;
pub mod input;
pub mod logger;
pub mod merge;
pub mod output;
pub mod state;
pub mod verify;
pub mod wordlist;

// 重新导出主要的公共API
pub use api::{run_recon, ReconConfig, ReconEngine, Stage, StageOutcome};

pub use collector::{Collector, CommandSpec, ParamCollector, ScreenshotCollector};
pub use dns_resolver::{DnsResolver, HostLookup, ResolverPool};
pub use error::{ReconError, Result};
pub use merge::{PassiveSource, SubdomainSet, Sublist3rSource};
pub use output::{RunSummary, StageReport};
pub use verify::{DomainVerifier, HttpProbe, ProberPool};
