use colored::*;
use log::{Level, LevelFilter, Log, Metadata, Record};

struct ShellLogger;

impl Log for ShellLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "[E]".red().bold(),
            Level::Warn => "[W]".yellow().bold(),
            Level::Info => "[I]".cyan(),
            Level::Debug => "[D]".bright_black(),
            Level::Trace => "[T]".bright_black(),
        };
        eprintln!("{} {}", tag, record.args().to_string().bright_black());
    }

    fn flush(&self) {}
}

/// 安装日志实现，级别取自 MINIFS_LOG（默认 warn）
pub fn init() {
    let level = std::env::var("MINIFS_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Warn);
    if log::set_boxed_logger(Box::new(ShellLogger)).is_ok() {
        log::set_max_level(level);
    }
}
