//! # registry：注册中心契约、进程级实例仓库与注册绑定
//!
//! ## 职责（Why）
//! - 注册中心的网络与存储实现属于外部协作方，本模块只定义 `init/start/register/unregister` 契约；
//! - 同一地址的注册中心在进程内只应存在一个实例，[`RegistryRepository`] 以 `protocol://address`
//!   为键去重，供所有服务提供方共享；
//! - [`RegistryBinder`] 在发布时预热并注册、在撤销时注销，各注册中心之间相互独立。
//!
//! ## 失败语义（What）
//! - 预热（取得或创建实例）失败直接向上传播，由发布流程统一包装；
//! - 注册阶段：框架错误中止发布，其余故障记录告警并跳过当前注册中心；
//! - 注销阶段：任何错误都只记录告警。

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tracing::{debug, warn};

use crate::{
    config::{ProviderConfig, RegistryConfig},
    error::Result,
};

/// 注册中心契约。
///
/// `init` 与 `start` 必须幂等：同一实例被多个服务提供方共享，每次发布都会调用。
pub trait Registry: Send + Sync {
    fn init(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    /// 注册服务提供方。
    fn register(&self, config: &Arc<ProviderConfig>) -> Result<()>;

    /// 注销服务提供方。
    fn unregister(&self, config: &ProviderConfig) -> Result<()>;
}

/// 按协议创建注册中心的工厂。
pub trait RegistryFactory: Send + Sync {
    fn create(&self, config: &RegistryConfig) -> Result<Arc<dyn Registry>>;
}

/// 注册中心实例仓库。
///
/// # 教案式说明
/// - **契约 (What)**：[`get_registry`](Self::get_registry) 对相同 `identity` 返回同一实例；
///   创建失败不占位，下次调用会重试；
/// - **执行逻辑 (How)**：借助 `DashMap::entry` 在分片锁内完成“查找或创建”，
///   并发的首次访问只会调用一次工厂。
#[derive(Default)]
pub struct RegistryRepository {
    registries: DashMap<String, Arc<dyn Registry>>,
}

impl RegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例。
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<RegistryRepository>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// 取得或创建注册中心实例。
    pub fn get_registry(&self, config: &RegistryConfig) -> Result<Arc<dyn Registry>> {
        match self.registries.entry(config.identity()) {
            Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            Entry::Vacant(vacant) => {
                let registry = config.factory().create(config)?;
                debug!(
                    registry = config.id(),
                    identity = vacant.key().as_str(),
                    "registry created"
                );
                vacant.insert(Arc::clone(&registry));
                Ok(registry)
            }
        }
    }

    /// 已创建的实例数量。
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }
}

impl fmt::Debug for RegistryRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .registries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort_unstable();
        f.debug_struct("RegistryRepository").field("registries", &keys).finish()
    }
}

/// 把服务提供方注册到配置中的注册中心列表。
pub(crate) struct RegistryBinder<'a> {
    config: &'a Arc<ProviderConfig>,
    repository: &'a RegistryRepository,
}

impl<'a> RegistryBinder<'a> {
    pub(crate) fn new(config: &'a Arc<ProviderConfig>, repository: &'a RegistryRepository) -> Self {
        Self { config, repository }
    }

    /// 在服务器开始接收流量前预先创建注册中心实例；未开启注册时不做任何事。
    pub(crate) fn prime(&self) -> Result<()> {
        if !self.config.is_register() {
            return Ok(());
        }
        for registry_config in self.config.registries() {
            self.repository.get_registry(registry_config)?;
        }
        Ok(())
    }

    /// 依次执行 `init → start → register`，返回注册成功的注册中心数量。
    ///
    /// 注册成功的注册中心按顺序追加到 `reached`，返回 `Err` 时同样保留已追加的部分。
    pub(crate) fn register(&self, reached: &mut Vec<Arc<RegistryConfig>>) -> Result<usize> {
        if !self.config.is_register() {
            return Ok(0);
        }
        let mut registered = 0;
        for registry_config in self.config.registries() {
            match self.register_one(registry_config) {
                Ok(()) => {
                    registered += 1;
                    reached.push(Arc::clone(registry_config));
                }
                Err(err) if err.is_framework() => return Err(err),
                Err(err) => {
                    warn!(
                        app = self.config.app_name(),
                        key = %self.config.identity(),
                        registry = registry_config.id(),
                        error = %err,
                        "Catch exception when register to registry: {}",
                        registry_config.id()
                    );
                }
            }
        }
        Ok(registered)
    }

    fn register_one(&self, registry_config: &RegistryConfig) -> Result<()> {
        let registry = self.repository.get_registry(registry_config)?;
        registry.init()?;
        registry.start()?;
        registry.register(self.config)
    }

    /// 从全部注册中心注销，返回注销成功的数量；错误只记录告警。
    pub(crate) fn unregister(&self) -> usize {
        if !self.config.is_register() {
            return 0;
        }
        self.unregister_from(self.config.registries())
    }

    /// 仅从给定的注册中心注销。
    pub(crate) fn unregister_from(&self, registries: &[Arc<RegistryConfig>]) -> usize {
        let mut unregistered = 0;
        for registry_config in registries {
            let outcome = self
                .repository
                .get_registry(registry_config)
                .and_then(|registry| registry.unregister(self.config));
            match outcome {
                Ok(()) => unregistered += 1,
                Err(err) => {
                    warn!(
                        app = self.config.app_name(),
                        key = %self.config.identity(),
                        registry = registry_config.id(),
                        error = %err,
                        "Catch exception when unRegister from registry: {}, but you can ignore if it's called during process shutdown",
                        registry_config.id()
                    );
                }
            }
        }
        unregistered
    }
}
