use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::collector::{run_command, tool_available, CommandSpec};
use crate::error::{ReconError, Result};
use crate::output::{read_lines, write_lines};

/// 被动枚举默认使用的搜索引擎
pub const DEFAULT_ENGINES: &str = "google,bing,baidu,yahoo,netcraft,virustotal";

/// 去重后的子域名集合
///
/// 按字符串精确比较：不做大小写或结尾点号的规范化。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubdomainSet {
    hosts: HashSet<String>,
}

impl SubdomainSet {
    /// 合并被动枚举结果和暴破结果
    pub fn merge<P, B>(passive: P, bruteforced: B) -> Self
    where
        P: IntoIterator<Item = String>,
        B: IntoIterator<Item = String>,
    {
        let hosts = passive
            .into_iter()
            .chain(bruteforced)
            .filter(|host| !host.is_empty())
            .collect();
        SubdomainSet { hosts }
    }

    /// 被动枚举失败时按零结果处理
    pub fn merge_outcome<B>(passive: Result<Vec<String>>, bruteforced: B) -> Self
    where
        B: IntoIterator<Item = String>,
    {
        let passive = passive.unwrap_or_else(|e| {
            warn!("Passive enumeration failed, using bruteforce results only: {}", e);
            Vec::new()
        });
        Self::merge(passive, bruteforced)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains(host)
    }

    /// 排序后的主机名列表
    pub fn to_sorted_vec(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.hosts.iter().cloned().collect();
        hosts.sort();
        hosts
    }

    /// 写入文件，每行一个主机名；集合为空时创建空文件
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_lines(path, self.to_sorted_vec())
    }
}

/// 被动子域名来源（搜索引擎、威胁情报聚合等外部服务）
#[async_trait]
pub trait PassiveSource: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// 返回发现的主机名，`output_path` 供外部工具写入原始结果
    async fn enumerate(
        &self,
        domain: &str,
        threads: usize,
        output_path: &Path,
    ) -> Result<Vec<String>>;
}

/// 调用 Sublist3r 命令行进行被动枚举
#[derive(Debug, Clone)]
pub struct Sublist3rSource {
    binary: String,
    engines: String,
    timeout: Duration,
}

impl Sublist3rSource {
    pub fn new(engines: &str, timeout: Duration) -> Self {
        Sublist3rSource {
            binary: "sublist3r".to_string(),
            engines: engines.to_string(),
            timeout,
        }
    }

    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }

    pub fn invocation(&self, domain: &str, threads: usize, output_path: &Path) -> CommandSpec {
        CommandSpec::new(
            &self.binary,
            [
                "-d".to_string(),
                domain.to_string(),
                "-t".to_string(),
                threads.to_string(),
                "-e".to_string(),
                self.engines.clone(),
                "-o".to_string(),
                output_path.display().to_string(),
            ],
        )
    }
}

#[async_trait]
impl PassiveSource for Sublist3rSource {
    fn name(&self) -> &str {
        &self.binary
    }

    fn is_available(&self) -> bool {
        tool_available(&self.binary)
    }

    async fn enumerate(
        &self,
        domain: &str,
        threads: usize,
        output_path: &Path,
    ) -> Result<Vec<String>> {
        info!("Enumerating subdomains for {} with {} threads (passive)...", domain, threads);

        // 没有结果时 Sublist3r 不会写文件，上一次运行的残留必须先清掉
        match std::fs::remove_file(output_path) {
            Ok(()) => debug!("Removed stale {}", output_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let spec = self.invocation(domain, threads, output_path);
        let output = run_command(&spec, self.timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ReconError::collaborator(&self.binary, stderr));
        }

        if !output_path.exists() {
            return Ok(Vec::new());
        }
        read_lines(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_without_duplicates() {
        let set = SubdomainSet::merge(
            owned(&["www.example.test", "mail.example.test"]),
            owned(&["www.example.test", "api.example.test"]),
        );
        assert_eq!(
            set.to_sorted_vec(),
            vec!["api.example.test", "mail.example.test", "www.example.test"]
        );
    }

    #[test]
    fn test_order_independent() {
        let p = owned(&["a.example.test", "b.example.test"]);
        let b = owned(&["c.example.test", "a.example.test"]);
        let forward = SubdomainSet::merge(p.clone(), b.clone());
        let reversed = SubdomainSet::merge(
            b.into_iter().rev().collect::<Vec<_>>(),
            p.into_iter().rev().collect::<Vec<_>>(),
        );
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_exact_string_equality() {
        let set = SubdomainSet::merge(
            owned(&["WWW.example.test", "www.example.test."]),
            owned(&["www.example.test"]),
        );
        assert_eq!(set.len(), 3);
        assert!(set.contains("WWW.example.test"));
    }

    #[test]
    fn test_passive_error_treated_as_empty() {
        let set = SubdomainSet::merge_outcome(
            Err(ReconError::collaborator("sublist3r", "boom")),
            owned(&["www.example.test"]),
        );
        assert_eq!(set.to_sorted_vec(), vec!["www.example.test"]);
    }

    #[test]
    fn test_persist_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdomains.txt");
        SubdomainSet::merge(Vec::new(), Vec::new()).persist(&path).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_sublist3r_invocation() {
        let source = Sublist3rSource::new(DEFAULT_ENGINES, Duration::from_secs(60));
        let spec = source.invocation("example.test", 40, Path::new("out/subdomains.txt"));
        assert_eq!(spec.program, "sublist3r");
        assert_eq!(
            spec.args,
            vec![
                "-d",
                "example.test",
                "-t",
                "40",
                "-e",
                DEFAULT_ENGINES,
                "-o",
                "out/subdomains.txt",
            ]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sublist3r_reads_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-sublist3r");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'www.example.test\\nmail.example.test\\n' > \"$8\"\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let source = Sublist3rSource::new(DEFAULT_ENGINES, Duration::from_secs(10))
            .with_binary(script.to_str().unwrap());
        assert!(source.is_available());

        let found = source
            .enumerate("example.test", 4, &dir.path().join("subdomains.txt"))
            .await
            .unwrap();
        assert_eq!(found, vec!["www.example.test", "mail.example.test"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sublist3r_ignores_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("quiet-sublist3r");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let output = dir.path().join("subdomains.txt");
        std::fs::write(&output, "admin.previous-target.test\n").unwrap();

        let source = Sublist3rSource::new(DEFAULT_ENGINES, Duration::from_secs(10))
            .with_binary(script.to_str().unwrap());
        let found = source.enumerate("example.test", 4, &output).await.unwrap();
        assert!(found.is_empty());
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sublist3r_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source =
            Sublist3rSource::new(DEFAULT_ENGINES, Duration::from_secs(10)).with_binary("false");
        assert!(source
            .enumerate("example.test", 4, &dir.path().join("subdomains.txt"))
            .await
            .is_err());
    }
}
