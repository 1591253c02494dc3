//! # runtime：进程级运行态与共享服务集合
//!
//! ## 职责（Why）
//! - [`RuntimeContext`] 记录当前处于已发布状态的服务提供方，供进程退出时统一撤销；
//! - [`ProviderServices`] 把发布流程依赖的四个进程级表（发布键计数、注册中心仓库、运行态、
//!   参数类型缓存）聚合为一个句柄，默认指向进程级单例，测试可使用互相隔离的实例。
//!
//! ## 契约（What）
//! - 发布成功后登记，撤销时移除；登记表持有强引用，撤销即打破引用；
//! - [`RuntimeContext::destroy`] 在快照上逐个撤销，不持有表锁调用撤销流程。

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::info;

use crate::{
    bootstrap::ProviderBootstrap, export_keys::ExportKeyRegistry, reflect::MethodArgsCache,
    registry::RegistryRepository,
};

/// 已发布服务提供方的登记表。
#[derive(Debug, Default)]
pub struct RuntimeContext {
    providers: DashMap<u64, Arc<ProviderBootstrap>>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例。
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<RuntimeContext>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// 登记已发布的服务提供方。
    pub fn cache_provider(&self, bootstrap: Arc<ProviderBootstrap>) {
        self.providers.insert(bootstrap.instance_id(), bootstrap);
    }

    /// 移除登记。
    pub fn invalidate_provider(&self, bootstrap: &ProviderBootstrap) {
        self.providers.remove(&bootstrap.instance_id());
    }

    /// 当前登记的服务提供方快照，按创建顺序排列。
    pub fn providers(&self) -> Vec<Arc<ProviderBootstrap>> {
        let mut providers: Vec<_> = self
            .providers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        providers.sort_by_key(|bootstrap| bootstrap.instance_id());
        providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 撤销全部已登记的服务提供方，返回撤销数量。
    pub fn destroy(&self) -> usize {
        let providers = self.providers();
        for bootstrap in &providers {
            bootstrap.unexport();
        }
        info!(count = providers.len(), "providers unexported on destroy");
        providers.len()
    }
}

/// 发布流程依赖的进程级表。
#[derive(Clone, Debug)]
pub struct ProviderServices {
    pub export_keys: Arc<ExportKeyRegistry>,
    pub registries: Arc<RegistryRepository>,
    pub runtime: Arc<RuntimeContext>,
    pub method_args: Arc<MethodArgsCache>,
}

impl ProviderServices {
    /// 指向进程级单例。
    pub fn global() -> Self {
        Self {
            export_keys: ExportKeyRegistry::global(),
            registries: RegistryRepository::global(),
            runtime: RuntimeContext::global(),
            method_args: MethodArgsCache::global(),
        }
    }

    /// 全新的独立实例，互不共享状态。
    pub fn isolated() -> Self {
        Self {
            export_keys: Arc::new(ExportKeyRegistry::new()),
            registries: Arc::new(RegistryRepository::new()),
            runtime: Arc::new(RuntimeContext::new()),
            method_args: Arc::new(MethodArgsCache::new()),
        }
    }
}

impl Default for ProviderServices {
    fn default() -> Self {
        Self::global()
    }
}
