use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod images;
pub mod index;
pub mod init;
pub mod organize;
pub mod pack;
pub mod packgen;
pub mod processor;
pub mod scenes;
pub mod templates;
pub mod topic;
pub mod validate;

pub use error::{Error, Result};

pub type PipelineLogHook = Arc<Mutex<dyn Fn(&str) + Send + Sync + 'static>>;

static LOG_HOOK: Lazy<Mutex<Option<PipelineLogHook>>> = Lazy::new(|| Mutex::new(None));

/// Mirror every tagged log line to `hook` in addition to `tracing`.
pub fn set_log_hook(hook: Option<PipelineLogHook>) {
    if let Ok(mut guard) = LOG_HOOK.lock() {
        *guard = hook;
    }
}

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!("{}", message),
        "ERROR" => tracing::error!("{}", message),
        _ => tracing::info!("[{}] {}", tag, message),
    }

    if let Ok(guard) = LOG_HOOK.lock() {
        if let Some(hook) = guard.as_ref() {
            if let Ok(callback) = hook.lock() {
                let line = format!("[{}] {}", tag, message);
                callback(&line);
            }
        }
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}

pub(crate) fn loge(message: impl AsRef<str>) {
    logv("ERROR", message.as_ref());
}
