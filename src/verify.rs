use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{ReconError, Result};
use crate::output::{read_lines, write_lines};
use crate::state::StageState;

/// 探测进度输出间隔（按主机名计）
pub const PROBE_REPORT_EVERY: usize = 5;

/// 每个主机名都会尝试的协议
pub const SCHEMES: [&str; 2] = ["http", "https"];

pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; recon-bot)";

/// 单个URL的存活探测
///
/// 只要收到可解析的HTTP响应就返回状态码，不论 200、404 还是 500。
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<u16>;
}

/// 基于 reqwest 的 HEAD 探测器
pub struct DomainVerifier {
    client: Client,
    timeout_duration: Duration,
}

impl DomainVerifier {
    pub fn new(connect_timeout: Duration, total_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .danger_accept_invalid_certs(true) // 接受无效证书
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(DomainVerifier {
            client,
            timeout_duration: total_timeout,
        })
    }
}

#[async_trait]
impl HttpProbe for DomainVerifier {
    async fn probe(&self, url: &str) -> Result<u16> {
        let response = timeout(self.timeout_duration, self.client.head(url).send())
            .await
            .map_err(|_| ReconError::Timeout(url.to_string(), self.timeout_duration))??;

        Ok(response.status().as_u16())
    }
}

/// HTTP/HTTPS 存活探测工作池
pub struct ProberPool {
    prober: Arc<dyn HttpProbe>,
    concurrency: usize,
}

impl ProberPool {
    pub fn new(prober: Arc<dyn HttpProbe>, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(ReconError::InvalidConfig("探测并发数必须大于0".to_string()));
        }
        Ok(ProberPool { prober, concurrency })
    }

    /// 探测所有主机名的 http 和 https，返回存活URL（完成顺序，不保证稳定）
    pub async fn probe_hosts(
        &self,
        hostnames: &[String],
        cancel: &CancellationToken,
    ) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut hosts = Vec::with_capacity(hostnames.len());
        for hostname in hostnames {
            if seen.insert(hostname.as_str()) {
                hosts.push(hostname.clone());
            }
        }
        if hosts.is_empty() {
            return Vec::new();
        }

        info!("Probing {} subdomains...", hosts.len());

        let state = StageState::new("Probe", hosts.len(), PROBE_REPORT_EVERY);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for host in hosts {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Probing interrupted, waiting for in-flight requests");
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let prober = Arc::clone(&self.prober);
            let state = state.clone();

            tasks.spawn(async move {
                let _permit = permit;
                for scheme in SCHEMES {
                    let url = format!("{}://{}", scheme, host);
                    match prober.probe(&url).await {
                        Ok(status) => {
                            debug!("{} [{}]", url, status);
                            state.add_result(url);
                        }
                        Err(e) => debug!("{} 无响应: {}", url, e),
                    }
                }
                state.mark_processed();
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                debug!("探测任务异常退出: {}", e);
            }
        }

        let live = state.take_results();
        info!("Found {} responsive URLs", live.len());
        live
    }

    /// 从子域名文件读取主机名并写出存活URL文件
    ///
    /// 输入文件不存在或为空时写出空的URL文件。返回写出的URL数量。
    pub async fn probe_file(
        &self,
        subdomains_file: &Path,
        urls_file: &Path,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if !subdomains_file.exists() {
            warn!("Subdomains file not found: {}", subdomains_file.display());
            write_lines(urls_file, Vec::<String>::new())?;
            return Ok(0);
        }

        let hostnames = read_lines(subdomains_file)?;
        if hostnames.is_empty() {
            warn!("No subdomains found to probe");
            write_lines(urls_file, Vec::<String>::new())?;
            return Ok(0);
        }

        let live = self.probe_hosts(&hostnames, cancel).await;
        write_lines(urls_file, &live)?;
        Ok(live.len())
    }
}
