use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::api::{Stage, StageOutcome};
use crate::error::Result;

/// 写入文本文件，每行一条；文件总会被创建（即使没有内容）
pub fn write_lines<P, I, S>(path: P, lines: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    for line in lines {
        writer.write_all(line.as_ref().as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// 读取文本文件中的非空行（去除首尾空白）
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// 确保文件存在，已存在的文件内容保持不变
pub fn ensure_file<P: AsRef<Path>>(path: P) -> Result<()> {
    OpenOptions::new().create(true).append(true).open(path)?;
    Ok(())
}

/// 统计非空行数，文件不存在时为0
pub fn count_lines<P: AsRef<Path>>(path: P) -> usize {
    read_lines(path).map(|lines| lines.len()).unwrap_or(0)
}

/// 单个阶段的执行记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// 一次完整运行的汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub domain: String,
    pub output_dir: String,
    pub subdomains: usize,
    pub live_urls: usize,
    pub stages: Vec<StageReport>,
    pub interrupted: bool,
    pub started_at: String,
    pub finished_at: String,
}

impl RunSummary {
    /// 打印最终汇总
    pub fn print_summary(&self) {
        if self.interrupted {
            info!("Reconnaissance interrupted, partial results saved in: {}", self.output_dir);
        } else {
            info!("Reconnaissance completed successfully!");
            info!("Results saved in: {}", self.output_dir);
        }
        info!("Subdomains found: {}", self.subdomains);
        info!("Responsive URLs: {}", self.live_urls);
    }

    /// 某个阶段的执行结果
    pub fn outcome(&self, stage: Stage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|report| report.stage == stage)
            .map(|report| &report.outcome)
    }
}

/// 导出JSON格式的运行报告
pub fn export_report<P: AsRef<Path>>(summary: &RunSummary, path: P) -> Result<()> {
    let json_data = serde_json::to_string_pretty(summary)?;
    fs::write(path.as_ref(), json_data)?;
    info!("Report exported to: {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_empty_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subdomains.txt");

        write_lines(&path, Vec::<String>::new()).unwrap();
        assert!(path.exists());
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(count_lines(&path), 0);
    }

    #[test]
    fn test_write_and_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");

        write_lines(&path, ["https://api.example.test", "http://www.example.test"]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "https://api.example.test\nhttp://www.example.test\n"
        );
        assert_eq!(read_lines(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_ensure_file_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.txt");

        ensure_file(&path).unwrap();
        assert!(path.exists());

        write_lines(&path, ["http://a.example.test"]).unwrap();
        ensure_file(&path).unwrap();
        assert_eq!(count_lines(&path), 1);
    }

    #[test]
    fn test_count_missing_file() {
        assert_eq!(count_lines("/definitely/not/here.txt"), 0);
    }

    #[test]
    fn test_export_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let summary = RunSummary {
            domain: "example.test".to_string(),
            output_dir: dir.path().display().to_string(),
            subdomains: 2,
            live_urls: 1,
            stages: vec![StageReport {
                stage: Stage::Enumerate,
                outcome: StageOutcome::Completed,
            }],
            interrupted: false,
            started_at: "2026-01-01 00:00:00 UTC".to_string(),
            finished_at: "2026-01-01 00:01:00 UTC".to_string(),
        };

        export_report(&summary, &path).unwrap();
        let parsed: RunSummary = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.subdomains, 2);
        assert_eq!(parsed.outcome(Stage::Enumerate), Some(&StageOutcome::Completed));
        assert_eq!(parsed.outcome(Stage::Probe), None);
    }
}
