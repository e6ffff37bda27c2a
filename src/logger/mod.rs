use colored::*;
use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;
use std::sync::Mutex;

/// 带颜色标签的终端日志器
pub struct Logger {
    use_colors: bool,
    max_level: Level,
    mutex: Mutex<()>,
}

impl Logger {
    pub fn new(max_level: Level) -> Self {
        Logger {
            use_colors: true,
            max_level,
            mutex: Mutex::new(()),
        }
    }

    /// 关闭颜色输出（重定向到文件时使用）
    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn label(level: Level) -> &'static str {
        match level {
            Level::Error => "[-]",
            Level::Warn => "[!]",
            Level::Info => "[+]",
            Level::Debug => "[?]",
            Level::Trace => "[ ]",
        }
    }

    fn wrap(&self, level: Level) -> String {
        let label = Self::label(level);
        if !self.use_colors {
            return label.to_string();
        }

        match level {
            Level::Error => label.red().bold().to_string(),
            Level::Warn => label.yellow().bold().to_string(),
            Level::Info => label.green().to_string(),
            Level::Debug => label.blue().to_string(),
            Level::Trace => label.dimmed().to_string(),
        }
    }

    /// 格式化一条日志记录
    pub fn format(&self, level: Level, args: &std::fmt::Arguments) -> String {
        format!("{} {}", self.wrap(level), args)
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = self.format(record.level(), record.args());
        let _guard = self.mutex.lock();
        if record.level() <= Level::Warn {
            let _ = writeln!(std::io::stderr(), "{}", line);
        } else {
            let _ = writeln!(std::io::stdout(), "{}", line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stdout().flush();
    }
}

/// 安装全局日志器，重复调用时忽略
pub fn init_logger(level: LevelFilter) {
    let max_level = level.to_level().unwrap_or(Level::Error);
    if log::set_boxed_logger(Box::new(Logger::new(max_level))).is_ok() {
        log::set_max_level(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_plain_labels() {
        let logger = Logger::new(Level::Info).without_colors();
        assert_eq!(
            logger.format(Level::Info, &format_args!("Found: {}", "www.example.test")),
            "[+] Found: www.example.test"
        );
        assert_eq!(logger.format(Level::Warn, &format_args!("skip")), "[!] skip");
        assert_eq!(logger.format(Level::Error, &format_args!("boom")), "[-] boom");
    }

    #[test]
    fn test_init_logger_sets_max_level() {
        init_logger(LevelFilter::Debug);
        assert_eq!(log::max_level(), LevelFilter::Debug);
        log::debug!("logger installed");
    }

    #[test]
    fn test_level_filter() {
        let logger = Logger::new(Level::Warn);
        let info = Metadata::builder().level(Level::Info).build();
        let warn = Metadata::builder().level(Level::Warn).build();
        assert!(!logger.enabled(&info));
        assert!(logger.enabled(&warn));
    }
}
