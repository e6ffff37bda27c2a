use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::collector::{Collector, ParamCollector, ScreenshotCollector};
use crate::dns_resolver::{DnsResolver, HostLookup, ResolverPool};
use crate::error::{ReconError, Result};
use crate::merge::{PassiveSource, SubdomainSet, Sublist3rSource, DEFAULT_ENGINES};
use crate::output::{count_lines, ensure_file, export_report, write_lines, RunSummary, StageReport};
use crate::verify::{DomainVerifier, HttpProbe, ProberPool};
use crate::wordlist::load_wordlist;

pub const SUBDOMAINS_FILE: &str = "subdomains.txt";
pub const URLS_FILE: &str = "urls.txt";

/// 侦察流程配置
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// 目标域名
    pub domain: String,
    /// 输出目录
    pub output_dir: PathBuf,
    /// 字典文件路径，为空时只做被动枚举
    pub wordlist: Option<PathBuf>,
    /// 只使用字典的前N条
    pub wordlist_limit: usize,
    /// 被动枚举和DNS暴破的并发数
    pub threads: usize,
    /// 单次DNS查询超时
    pub dns_timeout: Duration,
    /// HTTP探测并发数
    pub probe_threads: usize,
    pub probe_connect_timeout: Duration,
    pub probe_timeout: Duration,
    pub gowitness_threads: usize,
    /// gowitness 全部尝试的总超时
    pub gowitness_timeout: Duration,
    pub arjun_threads: usize,
    /// arjun 单个URL超时
    pub arjun_timeout: Duration,
    /// 被动枚举使用的搜索引擎
    pub passive_engines: String,
    pub passive_timeout: Duration,
    pub skip_passive: bool,
    pub skip_gowitness: bool,
    pub skip_arjun: bool,
    /// JSON报告输出路径
    pub report: Option<PathBuf>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            domain: String::new(),
            output_dir: PathBuf::from("recon_output"),
            wordlist: None,
            wordlist_limit: 5000,
            threads: 40,
            dns_timeout: Duration::from_secs(2),
            probe_threads: 10,
            probe_connect_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(5),
            gowitness_threads: 20,
            gowitness_timeout: Duration::from_secs(600),
            arjun_threads: 10,
            arjun_timeout: Duration::from_secs(300),
            passive_engines: DEFAULT_ENGINES.to_string(),
            passive_timeout: Duration::from_secs(600),
            skip_passive: false,
            skip_gowitness: false,
            skip_arjun: false,
            report: None,
        }
    }
}

impl ReconConfig {
    pub fn new(domain: &str) -> Self {
        ReconConfig {
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    /// 校验配置，失败即为致命配置错误
    pub fn validate(&self) -> Result<()> {
        validate_domain(&self.domain)?;

        let counts = [
            ("threads", self.threads),
            ("probe-threads", self.probe_threads),
            ("arjun-threads", self.arjun_threads),
            ("gowitness-threads", self.gowitness_threads),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ReconError::InvalidConfig(format!("{} 必须大于0", name)));
            }
        }

        let timeouts = [
            ("dns-timeout", self.dns_timeout),
            ("probe-connect-timeout", self.probe_connect_timeout),
            ("probe-timeout", self.probe_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ReconError::InvalidConfig(format!("{} 必须大于0", name)));
            }
        }
        Ok(())
    }

    pub fn subdomains_file(&self) -> PathBuf {
        self.output_dir.join(SUBDOMAINS_FILE)
    }

    pub fn urls_file(&self) -> PathBuf {
        self.output_dir.join(URLS_FILE)
    }
}

/// 目标域名至少包含一个点，且不含空白或路径字符
pub fn validate_domain(domain: &str) -> Result<()> {
    let valid = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.contains("..")
        && !domain.chars().any(|c| c.is_whitespace() || c == '/' || c == ':');
    if valid {
        Ok(())
    } else {
        Err(ReconError::InvalidDomain(domain.to_string()))
    }
}

/// 流水线阶段，严格按顺序执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Enumerate,
    Probe,
    Screenshot,
    ParamDiscovery,
    Done,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::Enumerate => Stage::Probe,
            Stage::Probe => Stage::Screenshot,
            Stage::Screenshot => Stage::ParamDiscovery,
            Stage::ParamDiscovery | Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Enumerate => "Enumerate",
            Stage::Probe => "Probe",
            Stage::Screenshot => "GoWitness",
            Stage::ParamDiscovery => "Arjun",
            Stage::Done => "Done",
        };
        f.write_str(name)
    }
}

/// 阶段执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    /// 阶段内部失败，已写出空产物
    Failed(String),
    Skipped(String),
    Interrupted,
}

/// 侦察引擎
pub struct ReconEngine {
    config: ReconConfig,
    lookup: Arc<dyn HostLookup>,
    prober: Arc<dyn HttpProbe>,
    passive: Option<Arc<dyn PassiveSource>>,
    collectors: Vec<Box<dyn Collector>>,
    cancel: CancellationToken,
}

impl ReconEngine {
    /// 使用真实的DNS解析器、HTTP探测器和外部工具创建引擎
    pub fn new(config: ReconConfig) -> Result<Self> {
        config.validate()?;

        let lookup = Arc::new(DnsResolver::new(config.dns_timeout));
        let prober = Arc::new(DomainVerifier::new(
            config.probe_connect_timeout,
            config.probe_timeout,
        )?);

        let mut engine = Self::with_components(config, lookup, prober)?;

        if !engine.config.skip_passive {
            let source = Sublist3rSource::new(
                &engine.config.passive_engines,
                engine.config.passive_timeout,
            );
            engine = engine.with_passive(Arc::new(source));
        }
        if !engine.config.skip_gowitness {
            let collector = ScreenshotCollector::new(
                engine.config.gowitness_threads,
                engine.config.gowitness_timeout,
            );
            engine = engine.with_collector(Box::new(collector));
        }
        if !engine.config.skip_arjun {
            let collector =
                ParamCollector::new(engine.config.arjun_threads, engine.config.arjun_timeout);
            engine = engine.with_collector(Box::new(collector));
        }

        Ok(engine)
    }

    /// 使用自定义解析器和探测器创建引擎（不含被动来源和外部收集器）
    pub fn with_components(
        config: ReconConfig,
        lookup: Arc<dyn HostLookup>,
        prober: Arc<dyn HttpProbe>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(ReconEngine {
            config,
            lookup,
            prober,
            passive: None,
            collectors: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    pub fn with_passive(mut self, source: Arc<dyn PassiveSource>) -> Self {
        self.passive = Some(source);
        self
    }

    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 用于中断整个流程的取消信号
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    /// 检查外部工具：被动枚举工具为必需，其余缺失时只给出警告
    pub fn check_tools(&self) -> Result<()> {
        info!("Checking tool availability...");
        let mut available = Vec::new();

        if let Some(source) = &self.passive {
            if !source.is_available() {
                error!("{} is not installed or not in PATH", source.name());
                return Err(ReconError::ToolMissing(source.name().to_string()));
            }
            available.push(source.name().to_string());
        }

        for collector in &self.collectors {
            if collector.is_available() {
                available.push(collector.binary().to_string());
            } else {
                warn!(
                    "{} not available - {} stage will be skipped",
                    collector.binary(),
                    collector.stage()
                );
            }
        }

        info!("Available tools: {}", available.join(", "));
        Ok(())
    }

    fn prepare_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| ReconError::OutputDir {
            path: self.config.output_dir.clone(),
            source,
        })
    }

    /// 执行完整流程
    ///
    /// 只有输出目录无法创建时返回错误；各阶段内部失败都会降级为空产物。
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = now();
        self.prepare_output_dir()?;

        info!("Starting reconnaissance on {}", self.config.domain);
        info!("Results will be saved in: {}", self.config.output_dir.display());

        let subdomains_file = self.config.subdomains_file();
        let urls_file = self.config.urls_file();
        let mut stages = Vec::new();
        let mut stage = Stage::Enumerate;

        while stage != Stage::Done {
            let outcome = match stage {
                Stage::Enumerate => {
                    let work = self.enumerate(&subdomains_file);
                    self.guarded(stage, &subdomains_file, work).await
                }
                Stage::Probe => {
                    let work = self.probe(&subdomains_file, &urls_file);
                    self.guarded(stage, &urls_file, work).await
                }
                Stage::Screenshot | Stage::ParamDiscovery => {
                    self.run_collector(stage, &urls_file).await
                }
                Stage::Done => break,
            };
            stages.push(StageReport { stage, outcome });
            stage = stage.next();
        }

        let summary = RunSummary {
            domain: self.config.domain.clone(),
            output_dir: self.config.output_dir.display().to_string(),
            subdomains: count_lines(&subdomains_file),
            live_urls: count_lines(&urls_file),
            stages,
            interrupted: self.cancel.is_cancelled(),
            started_at,
            finished_at: now(),
        };

        if let Some(report) = &self.config.report {
            if let Err(e) = export_report(&summary, report) {
                error!("Failed to export report: {}", e);
            }
        }

        Ok(summary)
    }

    /// 阶段包装：内部错误记录日志并写出空产物，保证产物文件存在
    async fn guarded<F>(&self, stage: Stage, artifact: &Path, work: F) -> StageOutcome
    where
        F: Future<Output = Result<()>>,
    {
        if self.cancel.is_cancelled() {
            warn!("{} stage skipped after interrupt", stage);
            reset_artifact(artifact);
            return StageOutcome::Interrupted;
        }

        let outcome = match work.await {
            Ok(()) if self.cancel.is_cancelled() => StageOutcome::Interrupted,
            Ok(()) => StageOutcome::Completed,
            Err(e) => {
                error!("Error in {} stage: {}", stage, e);
                reset_artifact(artifact);
                StageOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = ensure_file(artifact) {
            error!("Failed to create {}: {}", artifact.display(), e);
        }
        outcome
    }

    async fn enumerate(&self, subdomains_file: &Path) -> Result<()> {
        let domain = &self.config.domain;

        let passive = match &self.passive {
            Some(source) => {
                let work = source.enumerate(domain, self.config.threads, subdomains_file);
                let enumerated = tokio::select! {
                    result = work => result,
                    _ = self.cancel.cancelled() => Err(ReconError::Interrupted),
                };
                Some(enumerated)
            }
            None => None,
        };
        let bruteforce_enabled = self.config.wordlist.is_some();
        let bruteforced = self.bruteforce().await?;

        let mode = match (passive.is_some(), bruteforce_enabled) {
            (true, true) => "passive + bruteforce",
            (true, false) => "passive",
            (false, _) => "bruteforce",
        };
        let passive = passive.unwrap_or_else(|| Ok(Vec::new()));
        let set = SubdomainSet::merge_outcome(passive, bruteforced);
        set.persist(subdomains_file)?;

        if set.is_empty() {
            warn!("No subdomains found");
        } else {
            info!("Found {} subdomains using {} enumeration.", set.len(), mode);
        }
        Ok(())
    }

    /// 字典缺失或无法读取时跳过暴破，不视为阶段失败
    async fn bruteforce(&self) -> Result<Vec<String>> {
        let path = match &self.config.wordlist {
            Some(path) => path,
            None => return Ok(Vec::new()),
        };

        info!("Loading wordlist (limit: {} entries)...", self.config.wordlist_limit);
        let wordlist = match load_wordlist(path, self.config.wordlist_limit) {
            Ok(wordlist) => wordlist,
            Err(e) => {
                warn!("Wordlist {}: {} ({})", wordlist_problem(&e), path.display(), e);
                warn!("Continuing with passive enumeration only...");
                return Ok(Vec::new());
            }
        };
        info!("Loaded {} subdomains for bruteforce", wordlist.len());

        let pool = ResolverPool::new(
            Arc::clone(&self.lookup),
            self.config.threads,
            self.config.dns_timeout,
        )?;
        let found = pool.resolve(&self.config.domain, &wordlist, &self.cancel).await;
        info!("Added {} subdomains from bruteforce", found.len());
        Ok(found)
    }

    async fn probe(&self, subdomains_file: &Path, urls_file: &Path) -> Result<()> {
        info!("Probing URLs...");
        let pool = ProberPool::new(Arc::clone(&self.prober), self.config.probe_threads)?;
        pool.probe_file(subdomains_file, urls_file, &self.cancel).await?;
        Ok(())
    }

    async fn run_collector(&self, stage: Stage, urls_file: &Path) -> StageOutcome {
        let collector = match self.collectors.iter().find(|c| c.stage() == stage) {
            Some(collector) => collector,
            None => {
                info!("Skipping {} as requested", stage);
                return StageOutcome::Skipped("disabled".to_string());
            }
        };

        if self.cancel.is_cancelled() {
            return StageOutcome::Interrupted;
        }
        if !collector.is_available() {
            warn!("Skipping {} - tool not available", collector.binary());
            return StageOutcome::Skipped(format!("{} not installed", collector.binary()));
        }
        if count_lines(urls_file) == 0 {
            warn!("No URLs file found or file is empty, skipping {}", stage);
            return StageOutcome::Skipped("no urls".to_string());
        }

        match collector.collect(urls_file, &self.config.output_dir, &self.cancel).await {
            Ok(()) => StageOutcome::Completed,
            Err(ReconError::Interrupted) => StageOutcome::Interrupted,
            Err(e) => {
                error!("Error running {}: {}", stage, e);
                StageOutcome::Failed(e.to_string())
            }
        }
    }
}

/// 字典加载失败的简短描述
fn wordlist_problem(err: &ReconError) -> &'static str {
    match err {
        ReconError::Io(e) => match e.kind() {
            std::io::ErrorKind::NotFound => "file not found",
            std::io::ErrorKind::PermissionDenied => "file not readable",
            std::io::ErrorKind::InvalidData => "is not valid UTF-8",
            _ => "could not be read",
        },
        _ => "could not be loaded",
    }
}

fn reset_artifact(path: &Path) {
    if let Err(e) = write_lines(path, Vec::<String>::new()) {
        error!("Failed to reset {}: {}", path.display(), e);
    }
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// 便捷函数：检查工具并执行完整流程
pub async fn run_recon(config: ReconConfig) -> Result<RunSummary> {
    let engine = ReconEngine::new(config)?;
    engine.check_tools()?;
    engine.run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconConfig::default();
        assert_eq!(config.threads, 40);
        assert_eq!(config.wordlist_limit, 5000);
        assert_eq!(config.dns_timeout, Duration::from_secs(2));
        assert_eq!(config.arjun_threads, 10);
        assert_eq!(config.output_dir, PathBuf::from("recon_output"));
        assert_eq!(config.passive_engines, DEFAULT_ENGINES);
        assert!(!config.skip_gowitness);
        assert!(!config.skip_arjun);
        assert!(config.wordlist.is_none());
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.test").is_ok());
        assert!(validate_domain("sub.example.co.uk").is_ok());
        assert!(validate_domain("localhost").is_err());
        assert!(validate_domain("").is_err());
        assert!(validate_domain(".example.test").is_err());
        assert!(validate_domain("http://example.test").is_err());
        assert!(validate_domain("exa mple.test").is_err());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = ReconConfig::new("example.test");
        assert!(config.validate().is_ok());

        config.threads = 0;
        assert!(matches!(config.validate(), Err(ReconError::InvalidConfig(_))));

        let mut config = ReconConfig::new("example.test");
        config.dns_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stage_order() {
        let mut order = vec![Stage::Enumerate];
        while *order.last().unwrap() != Stage::Done {
            let next = order.last().unwrap().next();
            order.push(next);
        }
        assert_eq!(
            order,
            vec![
                Stage::Enumerate,
                Stage::Probe,
                Stage::Screenshot,
                Stage::ParamDiscovery,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn test_wordlist_problem_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load_wordlist(dir.path().join("missing.txt"), 10).unwrap_err();
        assert_eq!(wordlist_problem(&missing), "file not found");

        let binary = dir.path().join("binary.txt");
        std::fs::write(&binary, [0xff, 0xfe, b'\n']).unwrap();
        let invalid = load_wordlist(&binary, 10).unwrap_err();
        assert_eq!(wordlist_problem(&invalid), "is not valid UTF-8");

        let not_a_file = load_wordlist(dir.path(), 10).unwrap_err();
        assert_ne!(wordlist_problem(&not_a_file), "file not found");
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&StageOutcome::Skipped("no urls".into())).unwrap();
        assert_eq!(json, r#"{"status":"skipped","detail":"no urls"}"#);
        let json = serde_json::to_string(&StageOutcome::Completed).unwrap();
        assert_eq!(json, r#"{"status":"completed"}"#);
    }
}
