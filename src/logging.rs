//! 日志初始化模块.
//!
//! 库 crate 通过 `log` 门面输出日志, 这里用 tracing-subscriber 统一接管:
//! - console: 彩色, 带源码位置
//! - file: 无色, 按天滚动, 非阻塞写入
//!
//! 级别由 verbosity (-v/-vv/-vvv) 决定, `WEBSCREEN_LOG` 环境变量可覆盖.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 覆盖日志级别的环境变量
pub const LOG_ENV: &str = "WEBSCREEN_LOG";

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 详细程度: 0=info, 1=webscreen debug, 2=webscreen trace, 3+=全部 trace
    pub verbosity: u8,
    /// 显式的过滤指令 (EnvFilter 语法), 优先于 verbosity
    pub level: Option<String>,
    /// 日志目录
    pub directory: String,
    /// 日志文件前缀
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            level: None,
            directory: "logs".into(),
            file_prefix: "webscreen".into(),
        }
    }
}

impl LoggingConfig {
    /// 过滤指令
    pub fn directive(&self) -> String {
        match &self.level {
            Some(level) => level.clone(),
            None => verbosity_directive(self.verbosity).into(),
        }
    }

    /// 日志目录路径
    pub fn directory_path(&self) -> PathBuf {
        PathBuf::from(&self.directory)
    }
}

/// verbosity → EnvFilter 指令
pub fn verbosity_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "info,webscreen=debug",
        2 => "info,webscreen=trace",
        _ => "trace",
    }
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.directive()))
}

/// 初始化日志系统
///
/// 只能调用一次, 重复初始化返回错误.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let directory = config.directory_path();
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("创建日志目录失败, path={}", directory.display()))?;

    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&directory)
        .with_context(|| format!("创建日志文件失败, path={}", directory.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    LOG_GUARD.set(guard).ok();

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(ConsoleFormatter)
        .with_filter(build_filter(config));

    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(build_filter(config));

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统已初始化")?;
    Ok(())
}

/// 当天日志文件的路径 (与滚动文件命名一致)
pub fn current_log_path(directory: &Path, prefix: &str) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, Local::now().format("%Y-%m-%d")))
}

/// Console 格式: 彩色, 带时间戳和源码位置
struct ConsoleFormatter;

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        let color = match *meta.level() {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        };
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {}{:5}\x1b[0m {}:{} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            color,
            meta.level(),
            meta.file().unwrap_or(meta.target()),
            meta.line().unwrap_or(0)
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 时间戳 + 级别 + target + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} {} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            event.metadata().level(),
            event.metadata().target(),
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_directive() {
        assert_eq!(verbosity_directive(0), "info");
        assert_eq!(verbosity_directive(1), "info,webscreen=debug");
        assert_eq!(verbosity_directive(2), "info,webscreen=trace");
        assert_eq!(verbosity_directive(7), "trace");
    }

    #[test]
    fn test_explicit_level_wins() {
        let config = LoggingConfig {
            verbosity: 2,
            level: Some("warn".into()),
            ..LoggingConfig::default()
        };
        assert_eq!(config.directive(), "warn");
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"directory": "/tmp/ws-logs", "verbosity": 1}"#).unwrap();
        assert_eq!(config.directory_path(), PathBuf::from("/tmp/ws-logs"));
        assert_eq!(config.file_prefix, "webscreen");
        assert_eq!(config.directive(), "info,webscreen=debug");
    }

    #[test]
    fn test_current_log_path() {
        let path = current_log_path(Path::new("logs"), "probe");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("probe.") && name.ends_with(".log"), "name={name}");
        assert_eq!(name.len(), "probe.2026-01-01.log".len());
    }
}
