//! # listener：属性热更新驱动的重新发布
//!
//! ## 协议（What）
//! 1. 逐项比较新值与当前值，记录发生变化的键的旧值；比较过程出错则只记日志并放弃本次变更；
//! 2. 无变化时直接返回；
//! 3. 有变化时依次执行“撤销发布 → 写入全部新值 → 重新发布”；
//! 4. 第 3 步失败时只写回变化键的旧值，再发布一次，并把这次发布的结果交回通知方。
//!
//! ## 并发（How）
//! - 同一监听器上的变更由 `reconfigure` 锁串行化，两次重新发布的撤销/发布序列不会交错；
//! - 监听器只持有发布器的弱引用，发布器释放后收到的通知被忽略。

use std::{collections::BTreeMap, sync::Weak};

use parking_lot::Mutex;
use tracing::{error, info};

use crate::{bootstrap::ProviderBootstrap, config::ConfigListener, error::Result};

/// 属性变更监听器，发布时挂载到配置上，撤销时清除。
pub struct ProviderAttributeListener {
    bootstrap: Weak<ProviderBootstrap>,
    reconfigure: Mutex<()>,
}

impl ProviderAttributeListener {
    pub(crate) fn new(bootstrap: Weak<ProviderBootstrap>) -> Self {
        Self {
            bootstrap,
            reconfigure: Mutex::new(()),
        }
    }

    fn reexport(
        bootstrap: &ProviderBootstrap,
        new_values: &BTreeMap<String, Option<String>>,
    ) -> Result<()> {
        bootstrap.unexport();
        for (key, value) in new_values {
            bootstrap
                .config()
                .update_attribute(key, value.as_deref(), true)?;
        }
        bootstrap.export()
    }
}

impl ConfigListener for ProviderAttributeListener {
    fn config_changed(&self, _new_value: &BTreeMap<String, String>) {}

    fn attr_updated(&self, new_values: &BTreeMap<String, Option<String>>) -> Result<()> {
        let _serial = self.reconfigure.lock();
        let Some(bootstrap) = self.bootstrap.upgrade() else {
            return Ok(());
        };
        let config = bootstrap.config();
        let app_name = config.app_name();

        let mut old_values = BTreeMap::new();
        for (key, new_value) in new_values {
            let old_value = match config.query_attribute(key) {
                Ok(old_value) => old_value,
                Err(err) => {
                    error!(
                        app = app_name,
                        key = %config.identity(),
                        error = %err,
                        "Catch exception when provider attribute compare"
                    );
                    return Ok(());
                }
            };
            if old_value != *new_value {
                old_values.insert(key.as_str(), old_value);
            }
        }
        if old_values.is_empty() {
            return Ok(());
        }

        info!(app = app_name, key = %config.identity(), "Reexport service {}", config.identity());
        let Err(err) = Self::reexport(&bootstrap, new_values) else {
            return Ok(());
        };
        error!(
            app = app_name,
            key = %config.identity(),
            error = %err,
            "Catch exception when provider attribute changed"
        );

        for (key, old_value) in &old_values {
            if let Err(rollback_err) = config.update_attribute(key, old_value.as_deref(), true) {
                error!(
                    app = app_name,
                    key = %config.identity(),
                    attribute = *key,
                    error = %rollback_err,
                    "failed to restore provider attribute"
                );
            }
        }
        bootstrap.export().inspect_err(|rollback_err| {
            error!(
                app = app_name,
                key = %config.identity(),
                error = %rollback_err,
                "rollback export failed"
            );
        })
    }
}
