//! 运行时辅助：panic hook、浏览器控制台日志与计时。

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::time::Duration;

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// 把 `log` 记录转发到 `console.*`（原生环境下写到 stderr）。
struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        emit(record.level(), &message);
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, message: &str) {
    let value = wasm_bindgen::JsValue::from_str(message);
    match level {
        Level::Error => web_sys::console::error_1(&value),
        Level::Warn => web_sys::console::warn_1(&value),
        Level::Info => web_sys::console::info_1(&value),
        Level::Debug | Level::Trace => web_sys::console::debug_1(&value),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(_level: Level, message: &str) {
    eprintln!("{message}");
}

/// 安装控制台日志；重复调用只保留第一次安装的 logger。
pub fn init_logging(level: LevelFilter) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// 同时适用于 wasm32 与原生目标的计时器。
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    #[cfg(target_arch = "wasm32")]
    started_ms: f64,
    #[cfg(not(target_arch = "wasm32"))]
    started: std::time::Instant,
}

impl Stopwatch {
    #[cfg(target_arch = "wasm32")]
    pub fn start() -> Self {
        Self {
            started_ms: web_sys::js_sys::Date::now(),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn start() -> Self {
        Self {
            started: std::time::Instant::now(),
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn elapsed(&self) -> Duration {
        let elapsed_ms = (web_sys::js_sys::Date::now() - self.started_ms).max(0.0);
        Duration::from_millis(elapsed_ms as u64)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwatch_never_runs_backwards() {
        let watch = Stopwatch::start();
        let first = watch.elapsed();
        let second = watch.elapsed();
        assert!(second >= first);
    }

    #[test]
    fn logging_can_be_initialised_repeatedly() {
        init_logging(LevelFilter::Warn);
        init_logging(LevelFilter::Debug);
        log::warn!("logger smoke test");
        assert!(log::max_level() <= LevelFilter::Warn);
    }
}
