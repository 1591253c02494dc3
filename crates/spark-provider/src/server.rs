//! # server：服务器契约与处理器绑定
//!
//! ## 职责（Why）
//! - 服务器的传输实现不在本 crate 内，这里只定义发布流程依赖的最小契约：
//!   注册处理器、注销处理器、启动；
//! - [`ServerBinder`] 负责把一个调用入口绑定到配置中的全部服务器，并在撤销时解绑。
//!
//! ## 失败语义（What）
//! - 绑定阶段：框架错误立即中止并向上传播；协作方故障记录错误日志后继续处理下一个服务器；
//! - 解绑阶段：任何错误都只记录告警，撤销流程不会因单个服务器失败而停止。

use std::sync::Arc;

use tracing::{error, warn};

use crate::{
    config::{ProviderConfig, ServerConfig, ServerSettings},
    error::Result,
    invoker::ProviderInvoker,
};

/// 服务器契约。
///
/// 实现必须支持多个服务提供方共享同一实例，`start` 需要幂等。
pub trait Server: Send + Sync {
    /// 注册某个服务提供方的处理器。
    fn register_processor(
        &self,
        config: &Arc<ProviderConfig>,
        invoker: Arc<ProviderInvoker>,
    ) -> Result<()>;

    /// 注销处理器；`close_if_no_entry` 取服务器配置的自动启动开关，为真时服务器可在处理器清空后自行关闭。
    fn unregister_processor(&self, config: &ProviderConfig, close_if_no_entry: bool) -> Result<()>;

    /// 启动服务器，已启动时直接返回。
    fn start(&self) -> Result<()>;
}

/// 按协议创建服务器的工厂。
pub trait ServerFactory: Send + Sync {
    fn create(&self, settings: &ServerSettings) -> Result<Arc<dyn Server>>;
}

/// 把调用入口绑定到配置中的服务器列表。
pub(crate) struct ServerBinder<'a> {
    config: &'a Arc<ProviderConfig>,
}

impl<'a> ServerBinder<'a> {
    pub(crate) fn new(config: &'a Arc<ProviderConfig>) -> Self {
        Self { config }
    }

    /// 按配置顺序绑定，返回成功绑定的服务器数量。
    ///
    /// # 教案式说明
    /// - **执行逻辑 (How)**：对每个服务器依次执行“取得或创建实例 → 注册处理器 → 按需启动”；
    ///   任一步骤的协作方故障只跳过当前服务器；
    /// - **后置条件**：处理器注册成功的服务器按顺序追加到 `bound`，即使随后的启动失败或整个绑定
    ///   返回 `Err`，调用方仍可据此精确撤回本次绑定。
    pub(crate) fn bind(
        &self,
        invoker: &Arc<ProviderInvoker>,
        bound: &mut Vec<Arc<ServerConfig>>,
    ) -> Result<usize> {
        let mut succeeded = 0;
        for server_config in self.config.servers() {
            match self.bind_one(server_config, invoker, bound) {
                Ok(()) => succeeded += 1,
                Err(err) if err.is_framework() => return Err(err),
                Err(err) => {
                    error!(
                        app = self.config.app_name(),
                        key = %self.config.identity(),
                        server = server_config.id(),
                        error = %err,
                        "Catch exception when register processor to server: {}",
                        server_config.id()
                    );
                }
            }
        }
        Ok(succeeded)
    }

    fn bind_one(
        &self,
        server_config: &Arc<ServerConfig>,
        invoker: &Arc<ProviderInvoker>,
        bound: &mut Vec<Arc<ServerConfig>>,
    ) -> Result<()> {
        let server = server_config.build_if_absent()?;
        server.register_processor(self.config, Arc::clone(invoker))?;
        bound.push(Arc::clone(server_config));
        if server_config.is_auto_start() {
            server.start()?;
        }
        Ok(())
    }

    /// 从配置中全部已创建的服务器上注销处理器，返回成功注销的数量。
    pub(crate) fn unbind(&self) -> usize {
        self.unbind_from(self.config.servers())
    }

    /// 仅从给定的服务器上注销处理器。
    pub(crate) fn unbind_from(&self, servers: &[Arc<ServerConfig>]) -> usize {
        let mut unbound = 0;
        for server_config in servers {
            let Some(server) = server_config.server() else {
                continue;
            };
            match server.unregister_processor(self.config, server_config.is_auto_start()) {
                Ok(()) => unbound += 1,
                Err(err) => {
                    warn!(
                        app = self.config.app_name(),
                        key = %self.config.identity(),
                        server = server_config.id(),
                        error = %err,
                        "Catch exception when unRegister processor to server: {}, but you can ignore if it's called during process shutdown",
                        server_config.id()
                    );
                }
            }
        }
        unbound
    }
}
