use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

use crate::error::Result;

/// 从文件加载字典：去除首尾空白、跳过空行，并截断到前 `limit` 条
pub fn load_wordlist<P: AsRef<Path>>(path: P, limit: usize) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let reader = io::BufReader::new(file);
    let mut wordlist = Vec::new();

    for line in reader.lines() {
        if wordlist.len() >= limit {
            break;
        }
        let line = line?;
        let word = line.trim();
        if !word.is_empty() {
            wordlist.push(word.to_string());
        }
    }

    Ok(wordlist)
}

/// 拼接候选子域名：`label.domain`
pub fn build_hostname(label: &str, domain: &str) -> String {
    let mut hostname = String::with_capacity(label.len() + domain.len() + 1);
    hostname.push_str(label);
    hostname.push('.');
    hostname.push_str(domain);
    hostname
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_truncates_preserving_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www\n\n  api  \nmail\nghost\ndev").unwrap();

        let words = load_wordlist(file.path(), 3).unwrap();
        assert_eq!(words, vec!["www", "api", "mail"]);

        let all = load_wordlist(file.path(), 5000).unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn test_zero_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www").unwrap();
        assert!(load_wordlist(file.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file() {
        assert!(load_wordlist("/definitely/not/here.txt", 10).is_err());
    }

    #[test]
    fn test_build_hostname() {
        assert_eq!(build_hostname("www", "example.test"), "www.example.test");
    }
}
