//! 集成测试共用的协作方替身与配置构造器。
//!
//! - 服务器与注册中心替身记录每次调用，并可按需注入“协作方故障”或“框架错误”；
//! - 每个测试使用 [`ProviderServices::isolated`]，计数表与注册中心仓库互不干扰，可并行执行。

#![allow(dead_code)]

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::Mutex;
use spark_provider::{
    ProviderConfig, ProviderError, ProviderInvoker, Registry, RegistryConfig, RegistryFactory,
    Result, Server, ServerConfig, ServerFactory, ServiceInterface, ServiceRef,
    config::{ATTR_TAGS, ProviderConfigBuilder, RegistrySettings, ServerSettings},
    interface::MethodDescriptor,
};

pub const ECHO_INTERFACE: &str = "com.example.EchoService";

pub trait Echo: Send + Sync {
    fn echo(&self, message: &str) -> String;
}

pub struct EchoImpl;

impl Echo for EchoImpl {
    fn echo(&self, message: &str) -> String {
        message.to_owned()
    }
}

/// 与 `Echo` 无关的另一接口，用于构造“实现不匹配”的配置。
pub trait Unrelated: Send + Sync {}

pub struct UnrelatedImpl;

impl Unrelated for UnrelatedImpl {}

pub fn echo_interface() -> ServiceInterface {
    ServiceInterface::of::<dyn Echo>(
        ECHO_INTERFACE,
        [
            MethodDescriptor::new("echo", ["String"]),
            MethodDescriptor::nullary("ping"),
            MethodDescriptor::nullary("getAll"),
        ],
    )
}

pub fn echo_ref() -> ServiceRef {
    ServiceRef::new::<dyn Echo>(Arc::new(EchoImpl))
}

/// 注入到替身中的故障类型。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Failure {
    #[default]
    None,
    Collaborator,
    Framework,
}

impl Failure {
    fn check(self, context: &'static str) -> Result<()> {
        match self {
            Failure::None => Ok(()),
            Failure::Collaborator => Err(ProviderError::collaborator(context, "injected failure")),
            Failure::Framework => Err(ProviderError::runtime(context)),
        }
    }
}

/// 服务器替身。
#[derive(Default)]
pub struct MockServer {
    pub registered: AtomicUsize,
    pub unregistered: AtomicUsize,
    pub started: AtomicUsize,
    processors: Mutex<BTreeMap<String, Arc<ProviderInvoker>>>,
    register_failure: Mutex<Failure>,
    unregister_failure: Mutex<Failure>,
    reject_tag: Mutex<Option<String>>,
}

impl MockServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_register(&self, failure: Failure) {
        *self.register_failure.lock() = failure;
    }

    pub fn fail_unregister(&self, failure: Failure) {
        *self.unregister_failure.lock() = failure;
    }

    /// 服务提供方的 `tags` 属性等于 `tag` 时，注册处理器返回框架错误。
    pub fn reject_tag(&self, tag: &str) {
        *self.reject_tag.lock() = Some(tag.to_owned());
    }

    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn has_processor(&self, key: &str) -> bool {
        self.processors.lock().contains_key(key)
    }

    pub fn processor(&self, key: &str) -> Option<Arc<ProviderInvoker>> {
        self.processors.lock().get(key).cloned()
    }
}

impl Server for MockServer {
    fn register_processor(
        &self,
        config: &Arc<ProviderConfig>,
        invoker: Arc<ProviderInvoker>,
    ) -> Result<()> {
        self.register_failure.lock().check("server.register_processor")?;
        let rejected = self.reject_tag.lock().clone();
        if rejected.is_some() && config.query_attribute(ATTR_TAGS)? == rejected {
            return Err(ProviderError::runtime("tag rejected by server"));
        }
        self.registered.fetch_add(1, Ordering::SeqCst);
        self.processors
            .lock()
            .insert(config.identity().to_string(), invoker);
        Ok(())
    }

    fn unregister_processor(
        &self,
        config: &ProviderConfig,
        _close_if_no_entry: bool,
    ) -> Result<()> {
        self.unregister_failure.lock().check("server.unregister_processor")?;
        self.unregistered.fetch_add(1, Ordering::SeqCst);
        self.processors.lock().remove(config.identity().as_str());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 始终返回同一服务器替身的工厂。
pub struct MockServerFactory {
    server: Arc<MockServer>,
    pub created: AtomicUsize,
}

impl MockServerFactory {
    pub fn new(server: &Arc<MockServer>) -> Arc<Self> {
        Arc::new(Self {
            server: Arc::clone(server),
            created: AtomicUsize::new(0),
        })
    }
}

impl ServerFactory for MockServerFactory {
    fn create(&self, _settings: &ServerSettings) -> Result<Arc<dyn Server>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let server: Arc<dyn Server> = self.server.clone();
        Ok(server)
    }
}

/// 注册中心替身。
#[derive(Default)]
pub struct MockRegistry {
    pub inits: AtomicUsize,
    pub starts: AtomicUsize,
    pub unregistered: AtomicUsize,
    registered: Mutex<Vec<String>>,
    register_failure: Mutex<Failure>,
    init_failure: Mutex<Failure>,
    unregister_failure: Mutex<Failure>,
}

impl MockRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_register(&self, failure: Failure) {
        *self.register_failure.lock() = failure;
    }

    pub fn fail_init(&self, failure: Failure) {
        *self.init_failure.lock() = failure;
    }

    pub fn fail_unregister(&self, failure: Failure) {
        *self.unregister_failure.lock() = failure;
    }

    /// 当前处于注册状态的服务提供方。
    pub fn registered(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    pub fn unregistered(&self) -> usize {
        self.unregistered.load(Ordering::SeqCst)
    }
}

impl Registry for MockRegistry {
    fn init(&self) -> Result<()> {
        self.init_failure.lock().check("registry.init")?;
        self.inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// 与真实注册中心一致，以服务标识为键，重复注册不产生新条目。
    fn register(&self, config: &Arc<ProviderConfig>) -> Result<()> {
        self.register_failure.lock().check("registry.register")?;
        let key = config.identity().to_string();
        let mut registered = self.registered.lock();
        if !registered.contains(&key) {
            registered.push(key);
        }
        Ok(())
    }

    fn unregister(&self, config: &ProviderConfig) -> Result<()> {
        self.unregister_failure.lock().check("registry.unregister")?;
        self.unregistered.fetch_add(1, Ordering::SeqCst);
        let mut registered = self.registered.lock();
        if let Some(position) = registered
            .iter()
            .position(|key| key == config.identity().as_str())
        {
            registered.remove(position);
        }
        Ok(())
    }
}

/// 注册中心工厂替身；`fail_create` 不为 `Failure::None` 时创建失败。
pub struct MockRegistryFactory {
    registry: Arc<MockRegistry>,
    fail_create: Failure,
}

impl RegistryFactory for MockRegistryFactory {
    fn create(&self, _config: &RegistryConfig) -> Result<Arc<dyn Registry>> {
        self.fail_create.check("registry.create")?;
        let registry: Arc<dyn Registry> = self.registry.clone();
        Ok(registry)
    }
}

pub fn server_config(id: &str, server: &Arc<MockServer>) -> Arc<ServerConfig> {
    Arc::new(ServerConfig::new(
        ServerSettings::new(id, "mock"),
        MockServerFactory::new(server),
    ))
}

pub fn registry_config(id: &str, registry: &Arc<MockRegistry>) -> Arc<RegistryConfig> {
    registry_config_with(id, registry, Failure::None)
}

/// 地址取自 `id`，不同 `id` 的注册中心在仓库中互不去重。
pub fn registry_config_with(
    id: &str,
    registry: &Arc<MockRegistry>,
    fail_create: Failure,
) -> Arc<RegistryConfig> {
    let factory = Arc::new(MockRegistryFactory {
        registry: Arc::clone(registry),
        fail_create,
    });
    Arc::new(RegistryConfig::new(
        RegistrySettings::new(id, "mock", format!("{id}.registry.local:9603")),
        factory,
    ))
}

/// 以 `Echo` 接口与实现开始构建配置。
pub fn echo_provider() -> ProviderConfigBuilder {
    ProviderConfig::builder(echo_interface())
        .service_ref(echo_ref())
        .app_name("echo-app")
}
