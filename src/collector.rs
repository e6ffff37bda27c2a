//! 外部工具调用
//!
//! 截图（gowitness）和参数发现（arjun）都是外部进程，通过URL文件交接。
//! 这里只负责拼装命令、超时控制和可用性检测，工具缺失或失败都不会中断流程。

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::api::Stage;
use crate::error::{ReconError, Result};
use crate::output::read_lines;
use crate::state::StageState;

/// 参数发现进度输出间隔
pub const ARJUN_REPORT_EVERY: usize = 5;

/// 一次外部命令调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// 子进程不读标准输入，句柄被丢弃时随之终止
fn command(spec: &CommandSpec) -> Command {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args).stdin(Stdio::null()).kill_on_drop(true);
    command
}

/// 执行命令并收集输出，超时后子进程会被杀掉
pub async fn run_command(spec: &CommandSpec, timeout: Duration) -> Result<Output> {
    tokio::time::timeout(timeout, command(spec).output())
        .await
        .map_err(|_| ReconError::Timeout(spec.program.clone(), timeout))?
        .map_err(ReconError::from)
}

/// 依次尝试多种调用方式，直到某一个退出码为0
///
/// `timeout` 覆盖全部尝试。成功时返回生效的调用序号。
pub async fn run_first_success(specs: &[CommandSpec], timeout: Duration) -> Result<usize> {
    let program = specs
        .first()
        .map(|spec| spec.program.clone())
        .unwrap_or_default();

    tokio::time::timeout(timeout, try_in_order(specs, &program))
        .await
        .map_err(|_| ReconError::Timeout(program.clone(), timeout))?
}

async fn try_in_order(specs: &[CommandSpec], program: &str) -> Result<usize> {
    let mut last_error = String::from("没有可用的调用方式");
    for (index, spec) in specs.iter().enumerate() {
        let output = command(spec).output().await?;

        if output.status.success() {
            return Ok(index);
        }
        last_error = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if last_error.is_empty() {
            last_error = format!("退出码 {:?}", output.status.code());
        }
        debug!("{} 调用方式 {} 失败: {}", spec.program, index, last_error);
    }
    Err(ReconError::collaborator(program, last_error))
}

/// 检查工具是否可执行：带路径时直接检查，否则在 PATH 中查找
pub fn tool_available(binary: &str) -> bool {
    find_tool(binary).is_some()
}

/// 查找工具的完整路径
pub fn find_tool(binary: &str) -> Option<PathBuf> {
    match which::which(binary) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!("{} 不可用: {}", binary, e);
            None
        }
    }
}

/// 以URL文件为输入的可选外部收集器
#[async_trait]
pub trait Collector: Send + Sync {
    /// 对应的流水线阶段
    fn stage(&self) -> Stage;

    /// 依赖的可执行文件
    fn binary(&self) -> &str;

    fn is_available(&self) -> bool {
        tool_available(self.binary())
    }

    async fn collect(
        &self,
        urls_file: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// gowitness 截图
#[derive(Debug, Clone)]
pub struct ScreenshotCollector {
    binary: String,
    threads: usize,
    page_timeout_secs: u64,
    overall_timeout: Duration,
}

impl ScreenshotCollector {
    pub fn new(threads: usize, overall_timeout: Duration) -> Self {
        ScreenshotCollector {
            binary: "gowitness".to_string(),
            threads,
            page_timeout_secs: 10,
            overall_timeout,
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    /// 新版语法优先，失败后退回旧版语法
    pub fn invocations(&self, urls_file: &Path, destination: &Path) -> Vec<CommandSpec> {
        let urls = urls_file.display().to_string();
        let dest = destination.display().to_string();
        let threads = self.threads.to_string();
        let timeout = self.page_timeout_secs.to_string();
        let (urls, dest, threads, timeout) =
            (urls.as_str(), dest.as_str(), threads.as_str(), timeout.as_str());

        vec![
            CommandSpec::new(
                &self.binary,
                [
                    "scan",
                    "file",
                    "-f",
                    urls,
                    "--screenshot-path",
                    dest,
                    "--threads",
                    threads,
                    "--timeout",
                    timeout,
                    "--write-db",
                ],
            ),
            CommandSpec::new(
                &self.binary,
                [
                    "file",
                    "-f",
                    urls,
                    "--timeout",
                    timeout,
                    "--threads",
                    threads,
                    "--destination",
                    dest,
                ],
            ),
        ]
    }
}

#[async_trait]
impl Collector for ScreenshotCollector {
    fn stage(&self) -> Stage {
        Stage::Screenshot
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    async fn collect(
        &self,
        urls_file: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let destination = output_dir.join("gowitness");
        tokio::fs::create_dir_all(&destination).await?;

        info!("Running GoWitness on URLs...");
        let specs = self.invocations(urls_file, &destination);
        let used = tokio::select! {
            result = run_first_success(&specs, self.overall_timeout) => result?,
            _ = cancel.cancelled() => return Err(ReconError::Interrupted),
        };

        if used > 0 {
            info!("GoWitness completed using legacy syntax");
        } else {
            info!("GoWitness completed successfully");
        }
        Ok(())
    }
}

/// arjun 参数发现，每个URL单独调用
#[derive(Debug, Clone)]
pub struct ParamCollector {
    binary: String,
    threads: usize,
    per_url_timeout: Duration,
}

impl ParamCollector {
    pub fn new(threads: usize, per_url_timeout: Duration) -> Self {
        ParamCollector {
            binary: "arjun".to_string(),
            threads: threads.max(1),
            per_url_timeout,
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    /// `https://a.example.test/x` -> `https_a.example.test_x.json`
    pub fn result_file_name(url: &str) -> String {
        format!("{}.json", url.replace("://", "_").replace('/', "_"))
    }

    pub fn invocation(&self, url: &str, result_file: &Path) -> CommandSpec {
        CommandSpec::new(
            &self.binary,
            [
                "-u".to_string(),
                url.to_string(),
                "-oJ".to_string(),
                result_file.display().to_string(),
            ],
        )
    }
}

#[async_trait]
impl Collector for ParamCollector {
    fn stage(&self) -> Stage {
        Stage::ParamDiscovery
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    async fn collect(
        &self,
        urls_file: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let urls = read_lines(urls_file)?;
        if urls.is_empty() {
            warn!("No URLs found in file, skipping Arjun");
            return Ok(());
        }

        let results_dir = output_dir.join("arjun_results");
        tokio::fs::create_dir_all(&results_dir).await?;

        info!("Running Arjun on {} URLs with {} threads...", urls.len(), self.threads);

        let state = StageState::new("Arjun", urls.len(), ARJUN_REPORT_EVERY);
        let semaphore = Arc::new(Semaphore::new(self.threads));
        let mut tasks = JoinSet::new();

        for url in urls {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let spec = self.invocation(&url, &results_dir.join(Self::result_file_name(&url)));
            let timeout = self.per_url_timeout;
            let state = state.clone();

            tasks.spawn(async move {
                let _permit = permit;
                match run_command(&spec, timeout).await {
                    Ok(_) => debug!("Completed: {}", url),
                    Err(ReconError::Timeout(..)) => debug!("Timeout: {}", url),
                    Err(e) => debug!("Error on {}: {}", url, e),
                }
                state.mark_processed();
            });
        }

        while tasks.join_next().await.is_some() {}

        if cancel.is_cancelled() {
            return Err(ReconError::Interrupted);
        }
        info!("Arjun parameter discovery completed");
        Ok(())
    }
}
