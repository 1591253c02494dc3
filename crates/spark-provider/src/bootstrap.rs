//! # bootstrap：服务提供方的发布生命周期
//!
//! ## 定位（Why）
//! - 把“参数校验 → 重复发布计数 → 构造调用入口 → 预热注册中心 → 绑定服务器 → 挂载监听器 →
//!   注册”编排为一次一致的状态迁移，并提供对称的撤销流程；
//! - 任一协作方的普通故障只影响自身，框架错误中止整个发布并回滚计数。
//!
//! ## 并发模型（What）
//! - `exported` 标志支持无锁快速判定；真正的发布与撤销都在实例级 `lifecycle` 锁内二次确认后执行，
//!   同一实例上的并发 `export()`/`unexport()` 互斥；
//! - 延迟发布运行在名为 `DelayExportThread` 的分离线程上；在其触发前调用 `unexport()` 会使其失效
//!   （发布纪元计数 `export_epoch` 递增）。
//!
//! ## 生命周期（How）
//! - 发布器只能以 `Arc` 形式存在：[`ProviderBootstrap::new`] 借助 `Arc::new_cyclic` 保存自身弱引用，
//!   供运行态登记、延迟线程与属性监听器回指。

use std::{
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ConfigListener, ProviderConfig, RegistryConfig, ServerConfig},
    error::{ProviderError, Result},
    invoker::ProviderInvoker,
    listener::ProviderAttributeListener,
    policy::MethodAccessPolicy,
    registry::RegistryBinder,
    runtime::ProviderServices,
    server::ServerBinder,
};

/// 延迟发布线程的名称。
pub const DELAY_EXPORT_THREAD_NAME: &str = "DelayExportThread";

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// 服务提供方发布器。
///
/// # 教案式说明
/// - **意图 (Why)**：一个发布器对应一个 [`ProviderConfig`]，负责其发布与撤销；
///   同一逻辑服务可由多个发布器重复发布，由 [`ExportKeyRegistry`](crate::export_keys::ExportKeyRegistry)
///   计数；
/// - **契约 (What)**：
///   - `export()`/`unexport()` 幂等，重复调用不产生额外副作用；
///   - 发布失败时计数已回滚，`is_exported()` 保持 `false`；
///   - `unexport()` 永不返回错误，适合在进程退出阶段调用；
/// - **风险 (Trade-offs)**：延迟发布的失败只能记录日志，调用方拿不到错误值。
pub struct ProviderBootstrap {
    instance_id: u64,
    self_ref: Weak<ProviderBootstrap>,
    config: Arc<ProviderConfig>,
    services: ProviderServices,
    exported: AtomicBool,
    lifecycle: Mutex<()>,
    invoker: Mutex<Option<Arc<ProviderInvoker>>>,
    export_epoch: AtomicU64,
    listener: Arc<ProviderAttributeListener>,
}

impl ProviderBootstrap {
    /// 使用进程级共享表创建发布器。
    pub fn new(config: Arc<ProviderConfig>) -> Arc<Self> {
        Self::with_services(config, ProviderServices::global())
    }

    /// 使用指定的共享表创建发布器。
    pub fn with_services(config: Arc<ProviderConfig>, services: ProviderServices) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            self_ref: self_ref.clone(),
            config,
            services,
            exported: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            invoker: Mutex::new(None),
            export_epoch: AtomicU64::new(0),
            listener: Arc::new(ProviderAttributeListener::new(self_ref.clone())),
        })
    }

    /// 进程内唯一的实例编号。
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn config(&self) -> &Arc<ProviderConfig> {
        &self.config
    }

    pub fn services(&self) -> &ProviderServices {
        &self.services
    }

    pub fn is_exported(&self) -> bool {
        self.exported.load(Ordering::Acquire)
    }

    /// 当前绑定在服务器上的调用入口，未发布时为 `None`。
    pub fn invoker(&self) -> Option<Arc<ProviderInvoker>> {
        self.invoker.lock().clone()
    }

    /// 发布服务。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：已发布时直接返回 `Ok(())`；配置了延迟时调度一次延迟发布并立即返回
    ///   `Ok(())`，延迟发布的错误只记录日志；
    /// - **执行逻辑 (How)**：延迟线程捕获调度时的发布纪元，唤醒后纪元已变化（期间发生过撤销）则放弃；
    ///   线程创建失败时退化为立即发布。
    pub fn export(&self) -> Result<()> {
        let delay = self.config.delay();
        if delay.is_zero() {
            return self.do_export();
        }
        if self.is_exported() {
            return Ok(());
        }
        let Some(this) = self.self_ref.upgrade() else {
            return self.do_export();
        };
        let epoch = self.export_epoch.load(Ordering::Acquire);
        let spawned = thread::Builder::new()
            .name(DELAY_EXPORT_THREAD_NAME.to_owned())
            .spawn(move || this.run_delayed_export(delay, epoch));
        match spawned {
            Ok(_) => {
                debug!(
                    app = self.config.app_name(),
                    key = %self.config.identity(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "delayed export scheduled"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    app = self.config.app_name(),
                    key = %self.config.identity(),
                    error = %err,
                    "failed to spawn delayed export thread, export immediately"
                );
                self.do_export()
            }
        }
    }

    fn run_delayed_export(&self, delay: Duration, epoch: u64) {
        thread::sleep(delay);
        if self.export_epoch.load(Ordering::Acquire) != epoch {
            debug!(
                app = self.config.app_name(),
                key = %self.config.identity(),
                "delayed export cancelled by unexport"
            );
            return;
        }
        if let Err(err) = self.do_export() {
            error!(
                app = self.config.app_name(),
                key = %self.config.identity(),
                error = %err,
                "delayed export failed"
            );
        }
    }

    fn do_export(&self) -> Result<()> {
        if self.is_exported() {
            return Ok(());
        }
        let _guard = self.lifecycle.lock();
        if self.is_exported() {
            return Ok(());
        }

        let config = &self.config;
        let key = config.identity();
        let app_name = config.app_name();
        let policy = self.check_parameters()?;
        info!(
            app = app_name,
            key = %key,
            "Export provider config : {} with bean id {}",
            key,
            config.id().unwrap_or("")
        );

        let count = self
            .services
            .export_keys
            .acquire(key, config.repeated_export_limit())?;
        if count > 1 {
            warn!(
                app = app_name,
                key = %key,
                count,
                "Duplicate provider config with key {} has been exported! \
                 Maybe it's wrong config, please check it. Ignore this if you did that on purpose!",
                key
            );
        }

        let mut trail = ExportTrail::default();
        if let Err(err) = self.bind_collaborators(policy, &mut trail) {
            self.discard_partial_bindings(&trail);
            return Err(err.into_framework());
        }

        if let Some(this) = self.self_ref.upgrade() {
            self.services.runtime.cache_provider(this);
        }
        self.exported.store(true, Ordering::Release);
        Ok(())
    }

    /// 校验实现与接口、服务器列表，并解析方法访问策略。
    fn check_parameters(&self) -> Result<Arc<MethodAccessPolicy>> {
        let config = &self.config;
        let interface = config.interface();
        match config.service_ref() {
            Some(service_ref) if interface.is_implemented_by(service_ref) => {}
            other => {
                let value = other.map_or("null", |service_ref| service_ref.type_name());
                return Err(ProviderError::configuration(
                    "provider.ref",
                    value,
                    format!(
                        "This is not an instance of {} in provider config with key {} !",
                        interface.id(),
                        config.identity()
                    ),
                ));
            }
        }
        if config.servers().is_empty() {
            return Err(ProviderError::configuration(
                "server",
                "NULL",
                format!(
                    "Value of \"server\" is not specified in provider config with key {} !",
                    config.identity()
                ),
            ));
        }

        let policy = Arc::new(MethodAccessPolicy::resolve(
            interface,
            config.include(),
            config.exclude(),
            config.app_name(),
            &self.services.method_args,
        ));
        config.set_methods_limit(Arc::clone(&policy));
        Ok(policy)
    }

    fn bind_collaborators(
        &self,
        policy: Arc<MethodAccessPolicy>,
        trail: &mut ExportTrail,
    ) -> Result<()> {
        let invoker = Arc::new(ProviderInvoker::new(Arc::clone(&self.config), policy));
        *self.invoker.lock() = Some(Arc::clone(&invoker));

        let registries = RegistryBinder::new(&self.config, &self.services.registries);
        registries.prime()?;
        let bound = ServerBinder::new(&self.config).bind(&invoker, &mut trail.servers)?;
        debug!(
            app = self.config.app_name(),
            key = %self.config.identity(),
            bound,
            "processor bound to servers"
        );
        let listener: Arc<dyn ConfigListener> = self.listener.clone();
        self.config.set_config_listener(Some(listener));
        registries.register(&mut trail.registries)?;
        Ok(())
    }

    /// 发布中途失败：回收计数、释放调用入口、清除监听器。
    ///
    /// 服务器与注册中心以服务标识为键，同一标识仍有其它发布时，本次失败的绑定与存活发布共用
    /// 同一条目，必须保留；只有计数归零后才撤回本次实际完成的绑定。
    fn discard_partial_bindings(&self, trail: &ExportTrail) {
        let config = &self.config;
        config.set_config_listener(None);
        self.invoker.lock().take();
        let remaining = self.services.export_keys.release(config.identity());
        if remaining > 0 {
            debug!(
                app = config.app_name(),
                key = %config.identity(),
                remaining,
                "bindings kept for other exports of the same key"
            );
            return;
        }
        RegistryBinder::new(config, &self.services.registries).unregister_from(&trail.registries);
        ServerBinder::new(config).unbind_from(&trail.servers);
    }

    /// 撤销发布。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：未发布时直接返回；所有协作方错误只记录告警，不会中断撤销；
    /// - **执行逻辑 (How)**：先递增发布纪元使挂起的延迟发布失效，再在 `lifecycle` 锁内二次确认后依次
    ///   注销注册中心、释放调用入口、解绑服务器、清除监听器、回收计数、移除运行态登记。
    pub fn unexport(&self) {
        self.export_epoch.fetch_add(1, Ordering::AcqRel);
        if !self.is_exported() {
            return;
        }
        let _guard = self.lifecycle.lock();
        if !self.is_exported() {
            return;
        }

        let config = &self.config;
        info!(
            app = config.app_name(),
            key = %config.identity(),
            "Unexport provider config : {} {}",
            config.identity(),
            config.id().map(|id| format!("with bean id {id}")).unwrap_or_default()
        );

        RegistryBinder::new(config, &self.services.registries).unregister();
        self.invoker.lock().take();
        ServerBinder::new(config).unbind();
        config.set_config_listener(None);
        let remaining = self.services.export_keys.release(config.identity());
        debug!(app = config.app_name(), key = %config.identity(), remaining, "export key released");
        self.services.runtime.invalidate_provider(self);
        self.exported.store(false, Ordering::Release);
    }
}

/// 一次发布尝试实际完成的绑定。
#[derive(Default)]
struct ExportTrail {
    servers: Vec<Arc<ServerConfig>>,
    registries: Vec<Arc<RegistryConfig>>,
}

impl fmt::Debug for ProviderBootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBootstrap")
            .field("instance_id", &self.instance_id)
            .field("identity", self.config.identity())
            .field("exported", &self.is_exported())
            .finish_non_exhaustive()
    }
}
