use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use trust_dns_resolver::config::*;
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::{ReconError, Result};
use crate::state::StageState;
use crate::wordlist::build_hostname;

/// 暴破进度输出间隔
pub const BRUTEFORCE_REPORT_EVERY: usize = 500;

/// 单个主机名的A/AAAA查询
///
/// 返回 `Ok(())` 表示解析成功；任何 `Err` 都只代表该候选被丢弃。
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn lookup(&self, hostname: &str) -> Result<()>;
}

/// 基于 trust-dns 的解析器
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsResolver {
    /// 使用系统DNS配置创建解析器，读取失败时退回默认配置
    pub fn new(timeout: Duration) -> Self {
        let (config, opts) = match trust_dns_resolver::system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                debug!("读取系统DNS配置失败，使用默认配置: {}", e);
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        Self::with_config(config, opts, timeout)
    }

    /// 使用指定的DNS配置创建解析器
    pub fn with_config(config: ResolverConfig, mut opts: ResolverOpts, timeout: Duration) -> Self {
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.try_tcp_on_error = false;
        DnsResolver {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl HostLookup for DnsResolver {
    async fn lookup(&self, hostname: &str) -> Result<()> {
        let response = tokio::time::timeout(self.timeout, self.resolver.lookup_ip(hostname))
            .await
            .map_err(|_| ReconError::Timeout(hostname.to_string(), self.timeout))??;

        if response.iter().next().is_some() {
            Ok(())
        } else {
            Err(ReconError::NotResolved(hostname.to_string()))
        }
    }
}

/// DNS暴破工作池
pub struct ResolverPool {
    lookup: Arc<dyn HostLookup>,
    concurrency: usize,
    timeout: Duration,
}

impl ResolverPool {
    pub fn new(lookup: Arc<dyn HostLookup>, concurrency: usize, timeout: Duration) -> Result<Self> {
        if concurrency == 0 {
            return Err(ReconError::InvalidConfig("DNS并发数必须大于0".to_string()));
        }
        if timeout.is_zero() {
            return Err(ReconError::InvalidConfig("DNS超时必须大于0".to_string()));
        }
        Ok(ResolverPool {
            lookup,
            concurrency,
            timeout,
        })
    }

    /// 并发解析 `label.base_domain`，只返回解析成功的主机名（完成顺序）
    ///
    /// `wordlist` 需由调用方预先截断。取消信号触发后不再派发新的查询，
    /// 已在执行的查询会自然完成或超时。
    pub async fn resolve(
        &self,
        base_domain: &str,
        wordlist: &[String],
        cancel: &CancellationToken,
    ) -> Vec<String> {
        if wordlist.is_empty() {
            return Vec::new();
        }

        let state = StageState::new("Bruteforce", wordlist.len(), BRUTEFORCE_REPORT_EVERY);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        info!("Starting DNS bruteforce with {} threads...", self.concurrency);

        for label in wordlist {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Bruteforce interrupted, waiting for in-flight lookups");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let hostname = build_hostname(label, base_domain);
            let lookup = Arc::clone(&self.lookup);
            let state = state.clone();
            let timeout = self.timeout;

            tasks.spawn(async move {
                let _permit = permit;
                match tokio::time::timeout(timeout, lookup.lookup(&hostname)).await {
                    Ok(Ok(())) => {
                        info!("Found: {}", hostname);
                        state.add_result(hostname);
                    }
                    Ok(Err(e)) => debug!("{} 丢弃: {}", hostname, e),
                    Err(_) => debug!("{} 查询超时", hostname),
                }
                state.mark_processed();
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                debug!("DNS查询任务异常退出: {}", e);
            }
        }

        let found = state.take_results();
        info!("Bruteforce completed: {} subdomains found", found.len());
        found
    }
}
