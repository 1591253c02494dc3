//! 全局订阅者安装只能成功一次；独立的测试二进制保证进程内尚未设置订阅者。

use spark_provider::telemetry::{self, TelemetryError};

#[test]
fn install_succeeds_once() {
    telemetry::install().expect("首次安装");
    assert!(matches!(
        telemetry::install(),
        Err(TelemetryError::AlreadyInstalled)
    ));
    tracing::info!(target: "spark_provider", "subscriber installed");
}
