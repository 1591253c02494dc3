//! 进程级日志订阅者的一次性安装入口。
//!
//! 发布流程中的日志全部经由 `tracing` 宏输出，本模块负责把它们接到 `fmt` 输出上；
//! 嵌入到已有宿主时，宿主自行安装订阅者即可，无需调用 [`install`]。

use std::sync::OnceLock;

use thiserror::Error;
use tracing::dispatcher;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

static INSTALLED: OnceLock<()> = OnceLock::new();

/// 安装订阅者可能出现的错误。
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `install` 被重复调用。
    #[error("telemetry has already been installed")]
    AlreadyInstalled,
    /// 宿主已设置全局订阅者。
    #[error("a global tracing subscriber has already been set")]
    SubscriberAlreadySet,
    /// 设置全局订阅者失败。
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] dispatcher::SetGlobalDefaultError),
}

/// 安装 `fmt + EnvFilter` 订阅者。
///
/// # 教案式说明
/// - **契约 (What)**：过滤规则取自 `RUST_LOG`，未设置或非法时为 `info`；
///   第二次调用返回 [`TelemetryError::AlreadyInstalled`]，宿主已设置订阅者时返回
///   [`TelemetryError::SubscriberAlreadySet`]。
pub fn install() -> Result<(), TelemetryError> {
    if INSTALLED.get().is_some() {
        return Err(TelemetryError::AlreadyInstalled);
    }
    if dispatcher::has_been_set() {
        return Err(TelemetryError::SubscriberAlreadySet);
    }

    let subscriber = tracing_subscriber::registry()
        .with(build_env_filter())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;
    INSTALLED.set(()).map_err(|_| TelemetryError::AlreadyInstalled)
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
