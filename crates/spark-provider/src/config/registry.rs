use std::{fmt, sync::Arc};

use super::RegistrySettings;
use crate::registry::RegistryFactory;

/// 注册中心配置。
///
/// 注册中心实例由 [`RegistryRepository`](crate::registry::RegistryRepository) 按
/// [`identity`](Self::identity) 去重，本结构只保存创建实例所需的设置与工厂。
pub struct RegistryConfig {
    settings: RegistrySettings,
    factory: Arc<dyn RegistryFactory>,
}

impl RegistryConfig {
    pub fn new(settings: RegistrySettings, factory: Arc<dyn RegistryFactory>) -> Self {
        Self { settings, factory }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn protocol(&self) -> &str {
        &self.settings.protocol
    }

    pub fn address(&self) -> &str {
        &self.settings.address
    }

    /// 去重键：`protocol://address`。
    pub fn identity(&self) -> String {
        format!("{}://{}", self.settings.protocol, self.settings.address)
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub(crate) fn factory(&self) -> &Arc<dyn RegistryFactory> {
        &self.factory
    }
}

impl fmt::Debug for RegistryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryConfig")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
