use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use super::ServerSettings;
use crate::{
    error::Result,
    server::{Server, ServerFactory},
};

/// 服务器配置，同时缓存由其创建的服务器实例。
///
/// # 教案式说明
/// - **意图 (Why)**：多个服务提供方可共享同一服务器配置，服务器只应创建一次；
/// - **契约 (What)**：
///   - [`build_if_absent`](Self::build_if_absent) 首次调用时经 [`ServerFactory`] 创建实例并缓存，
///     之后返回同一实例；创建失败不缓存，下次调用会重试；
///   - [`server`](Self::server) 只读取缓存，不触发创建，撤销发布据此判断是否需要解绑。
pub struct ServerConfig {
    settings: ServerSettings,
    factory: Arc<dyn ServerFactory>,
    server: Mutex<Option<Arc<dyn Server>>>,
}

impl ServerConfig {
    pub fn new(settings: ServerSettings, factory: Arc<dyn ServerFactory>) -> Self {
        Self {
            settings,
            factory,
            server: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn protocol(&self) -> &str {
        &self.settings.protocol
    }

    /// 注册处理器后是否自动启动服务器。
    pub fn is_auto_start(&self) -> bool {
        self.settings.auto_start
    }

    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// 获取服务器实例，不存在时创建。
    pub fn build_if_absent(&self) -> Result<Arc<dyn Server>> {
        let mut slot = self.server.lock();
        if let Some(server) = slot.as_ref() {
            return Ok(Arc::clone(server));
        }
        let server = self.factory.create(&self.settings)?;
        *slot = Some(Arc::clone(&server));
        Ok(server)
    }

    /// 已创建的服务器实例。
    pub fn server(&self) -> Option<Arc<dyn Server>> {
        self.server.lock().clone()
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("settings", &self.settings)
            .field("built", &self.server.lock().is_some())
            .finish()
    }
}
