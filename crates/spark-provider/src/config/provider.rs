use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use super::{ConfigChange, ConfigListener, RegistryConfig, ServerConfig};
use crate::{
    error::{ProviderError, Result},
    identity::ProviderIdentity,
    interface::{ServiceInterface, ServiceRef},
    policy::{ALL_METHODS, MethodAccessPolicy},
};

/// 服务标签。
pub const ATTR_TAGS: &str = "tags";
/// 权重，取值必须为整数。
pub const ATTR_WEIGHT: &str = "weight";
/// 并发上限，取值必须为整数；可按方法设置（`.<method>.concurrents`）。
pub const ATTR_CONCURRENTS: &str = "concurrents";
/// 超时毫秒数，取值必须为整数；可按方法设置。
pub const ATTR_TIMEOUT: &str = "timeout";

const NUMERIC_ATTRIBUTES: [&str; 3] = [ATTR_WEIGHT, ATTR_CONCURRENTS, ATTR_TIMEOUT];

/// 服务提供方配置。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合一次发布所需的全部输入，并承载可热更新的属性表与变更监听器插槽；
/// - **契约 (What)**：
///   - 除属性表、监听器插槽与方法策略外，其余字段构造后不可变；
///   - `identity` 在构造时计算一次，作为引用计数与绑定的键；
///   - `repeated_export_limit <= 0` 表示不限制重复发布；
/// - **风险 (Trade-offs)**：属性键的合法性在读写时校验，构造阶段不做校验，
///   错误的初始属性只会在首次查询或更新时暴露。
pub struct ProviderConfig {
    id: Option<String>,
    interface: ServiceInterface,
    service_ref: Option<ServiceRef>,
    unique_id: Option<String>,
    app_name: String,
    identity: ProviderIdentity,
    servers: Vec<Arc<ServerConfig>>,
    registries: Vec<Arc<RegistryConfig>>,
    include: String,
    exclude: String,
    delay: Duration,
    repeated_export_limit: i32,
    register: bool,
    attributes: RwLock<BTreeMap<String, String>>,
    listener: RwLock<Option<Arc<dyn ConfigListener>>>,
    methods_limit: ArcSwapOption<MethodAccessPolicy>,
}

/// 属性键的两种形态：普通键与 `.<method>.<property>` 方法级键。
enum AttributeKey<'a> {
    Plain(&'a str),
    Method { property: &'a str },
}

impl AttributeKey<'_> {
    fn property(&self) -> &str {
        match self {
            AttributeKey::Plain(property) | AttributeKey::Method { property } => property,
        }
    }
}

impl ProviderConfig {
    /// 以接口描述开始构建配置。
    pub fn builder(interface: ServiceInterface) -> ProviderConfigBuilder {
        ProviderConfigBuilder::new(interface)
    }

    /// Bean id，仅用于日志。
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn interface(&self) -> &ServiceInterface {
        &self.interface
    }

    pub fn interface_id(&self) -> &str {
        self.interface.id()
    }

    pub fn service_ref(&self) -> Option<&ServiceRef> {
        self.service_ref.as_ref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// 应用名，未配置时为空串。
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// 发布键：接口名 + 可选限定。
    pub fn identity(&self) -> &ProviderIdentity {
        &self.identity
    }

    pub fn servers(&self) -> &[Arc<ServerConfig>] {
        &self.servers
    }

    pub fn registries(&self) -> &[Arc<RegistryConfig>] {
        &self.registries
    }

    pub fn include(&self) -> &str {
        &self.include
    }

    pub fn exclude(&self) -> &str {
        &self.exclude
    }

    /// 延迟发布时长，零表示立即发布。
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn repeated_export_limit(&self) -> i32 {
        self.repeated_export_limit
    }

    /// 是否向注册中心注册。
    pub fn is_register(&self) -> bool {
        self.register
    }

    /// 属性表快照。
    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes.read().clone()
    }

    /// 查询属性当前值。
    ///
    /// - **契约 (What)**：空键、格式错误的方法级键、或引用接口未声明方法的键返回
    ///   [`ProviderError::Configuration`]；合法但未设置的键返回 `Ok(None)`。
    pub fn query_attribute(&self, key: &str) -> Result<Option<String>> {
        self.parse_attribute_key(key)?;
        Ok(self.attributes.read().get(key).cloned())
    }

    /// 更新属性，`value == None` 表示删除；返回属性表是否发生了写入。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：
    ///   - 键的校验规则同 [`query_attribute`](Self::query_attribute)；
    ///   - `weight`/`concurrents`/`timeout`（含方法级）必须能解析为整数；
    ///   - `ignore_if_same` 为真且新旧值相同时不写入，返回 `false`。
    pub fn update_attribute(
        &self,
        key: &str,
        value: Option<&str>,
        ignore_if_same: bool,
    ) -> Result<bool> {
        let parsed = self.parse_attribute_key(key)?;
        if let Some(value) = value {
            let numeric = NUMERIC_ATTRIBUTES
                .iter()
                .any(|name| *name == parsed.property());
            if numeric && value.trim().parse::<i64>().is_err() {
                return Err(ProviderError::configuration(
                    key.to_owned(),
                    value,
                    format!("attribute \"{key}\" of provider {} must be an integer", self.identity),
                ));
            }
        }

        let mut attributes = self.attributes.write();
        if ignore_if_same && attributes.get(key).map(String::as_str) == value {
            return Ok(false);
        }
        match value {
            Some(value) => {
                attributes.insert(key.to_owned(), value.to_owned());
            }
            None => {
                attributes.remove(key);
            }
        }
        Ok(true)
    }

    fn parse_attribute_key<'a>(&self, key: &'a str) -> Result<AttributeKey<'a>> {
        if key.trim().is_empty() {
            return Err(ProviderError::configuration(
                "attribute",
                key,
                format!("attribute key of provider {} must not be blank", self.identity),
            ));
        }
        let Some(scoped) = key.strip_prefix('.') else {
            return Ok(AttributeKey::Plain(key));
        };
        match scoped.split_once('.') {
            Some((method, property)) if !method.is_empty() && !property.is_empty() => {
                if self.interface.has_method(method) {
                    Ok(AttributeKey::Method { property })
                } else {
                    Err(ProviderError::configuration(
                        "attribute",
                        key,
                        format!(
                            "method \"{method}\" is not declared by interface {}",
                            self.interface.id()
                        ),
                    ))
                }
            }
            _ => Err(ProviderError::configuration(
                "attribute",
                key,
                "method scoped attribute must look like \".<method>.<property>\"",
            )),
        }
    }

    /// 挂载或清除变更监听器；同一时刻只保留一个。
    pub fn set_config_listener(&self, listener: Option<Arc<dyn ConfigListener>>) {
        *self.listener.write() = listener;
    }

    /// 当前挂载的监听器。
    pub fn config_listener(&self) -> Option<Arc<dyn ConfigListener>> {
        self.listener.read().clone()
    }

    /// 把配置变更派发给当前监听器；未挂载时静默忽略。
    ///
    /// 监听器在插槽锁之外被调用，回调内部可以安全地重新挂载或清除监听器。
    pub fn notify(&self, change: &ConfigChange) -> Result<()> {
        let Some(listener) = self.config_listener() else {
            return Ok(());
        };
        match change {
            ConfigChange::Replaced(new_value) => {
                listener.config_changed(new_value);
                Ok(())
            }
            ConfigChange::AttributesUpdated(new_values) => listener.attr_updated(new_values),
        }
    }

    /// 最近一次发布解析出的方法访问策略。
    pub fn methods_limit(&self) -> Option<Arc<MethodAccessPolicy>> {
        self.methods_limit.load_full()
    }

    pub(crate) fn set_methods_limit(&self, policy: Arc<MethodAccessPolicy>) {
        self.methods_limit.store(Some(policy));
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("identity", &self.identity)
            .field("app_name", &self.app_name)
            .field("servers", &self.servers.len())
            .field("registries", &self.registries.len())
            .field("include", &self.include)
            .field("exclude", &self.exclude)
            .field("delay", &self.delay)
            .field("repeated_export_limit", &self.repeated_export_limit)
            .field("register", &self.register)
            .finish_non_exhaustive()
    }
}

/// [`ProviderConfig`] 的构建器。
///
/// 默认值：`include = "*"`、`exclude = ""`、无延迟、重复发布上限 `1`、注册到注册中心。
pub struct ProviderConfigBuilder {
    id: Option<String>,
    interface: ServiceInterface,
    service_ref: Option<ServiceRef>,
    unique_id: Option<String>,
    app_name: String,
    servers: Vec<Arc<ServerConfig>>,
    registries: Vec<Arc<RegistryConfig>>,
    include: String,
    exclude: String,
    delay: Duration,
    repeated_export_limit: i32,
    register: bool,
    attributes: BTreeMap<String, String>,
}

impl ProviderConfigBuilder {
    fn new(interface: ServiceInterface) -> Self {
        Self {
            id: None,
            interface,
            service_ref: None,
            unique_id: None,
            app_name: String::new(),
            servers: Vec::new(),
            registries: Vec::new(),
            include: ALL_METHODS.to_owned(),
            exclude: String::new(),
            delay: Duration::ZERO,
            repeated_export_limit: 1,
            register: true,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn service_ref(mut self, service_ref: ServiceRef) -> Self {
        self.service_ref = Some(service_ref);
        self
    }

    #[must_use]
    pub fn unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = Some(unique_id.into());
        self
    }

    #[must_use]
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    #[must_use]
    pub fn server(mut self, server: Arc<ServerConfig>) -> Self {
        self.servers.push(server);
        self
    }

    #[must_use]
    pub fn servers(mut self, servers: impl IntoIterator<Item = Arc<ServerConfig>>) -> Self {
        self.servers.extend(servers);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Arc<RegistryConfig>) -> Self {
        self.registries.push(registry);
        self
    }

    #[must_use]
    pub fn registries(mut self, registries: impl IntoIterator<Item = Arc<RegistryConfig>>) -> Self {
        self.registries.extend(registries);
        self
    }

    #[must_use]
    pub fn include(mut self, include: impl Into<String>) -> Self {
        self.include = include.into();
        self
    }

    #[must_use]
    pub fn exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = exclude.into();
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn repeated_export_limit(mut self, limit: i32) -> Self {
        self.repeated_export_limit = limit;
        self
    }

    #[must_use]
    pub fn register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// 生成共享的配置对象。
    pub fn build(self) -> Arc<ProviderConfig> {
        let identity = ProviderIdentity::new(self.interface.id(), self.unique_id.as_deref());
        Arc::new(ProviderConfig {
            id: self.id,
            interface: self.interface,
            service_ref: self.service_ref,
            unique_id: self.unique_id,
            app_name: self.app_name,
            identity,
            servers: self.servers,
            registries: self.registries,
            include: self.include,
            exclude: self.exclude,
            delay: self.delay,
            repeated_export_limit: self.repeated_export_limit,
            register: self.register,
            attributes: RwLock::new(self.attributes),
            listener: RwLock::new(None),
            methods_limit: ArcSwapOption::empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::interface::MethodDescriptor;

    trait Greeter {}

    fn config() -> Arc<ProviderConfig> {
        let interface = ServiceInterface::of::<dyn Greeter>(
            "com.example.Greeter",
            [MethodDescriptor::new("greet", ["String"])],
        );
        ProviderConfig::builder(interface)
            .unique_id("v1")
            .app_name("demo")
            .attribute(ATTR_TAGS, "a")
            .build()
    }

    #[derive(Default)]
    struct CountingListener {
        replaced: AtomicUsize,
        updated: AtomicUsize,
    }

    impl ConfigListener for CountingListener {
        fn config_changed(&self, _new_value: &BTreeMap<String, String>) {
            self.replaced.fetch_add(1, Ordering::SeqCst);
        }

        fn attr_updated(&self, _new_values: &BTreeMap<String, Option<String>>) -> Result<()> {
            self.updated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn builder_defaults_and_identity() {
        let config = config();
        assert_eq!(config.identity().as_str(), "com.example.Greeter:v1");
        assert_eq!(config.include(), "*");
        assert_eq!(config.exclude(), "");
        assert_eq!(config.repeated_export_limit(), 1);
        assert!(config.is_register());
        assert!(config.delay().is_zero());
        assert!(config.methods_limit().is_none());
    }

    #[test]
    fn query_and_update_plain_and_method_scoped_keys() {
        let config = config();
        assert_eq!(config.query_attribute(ATTR_TAGS).expect("合法键"), Some("a".to_owned()));
        assert_eq!(config.query_attribute(ATTR_WEIGHT).expect("合法键"), None);

        assert!(
            config
                .update_attribute(".greet.concurrents", Some("8"), true)
                .expect("合法方法级键")
        );
        assert!(
            !config
                .update_attribute(".greet.concurrents", Some("8"), true)
                .expect("相同值")
        );
        assert!(config.update_attribute(ATTR_TAGS, None, true).expect("删除"));
        assert_eq!(
            config.attributes(),
            BTreeMap::from([(".greet.concurrents".to_owned(), "8".to_owned())])
        );
    }

    #[test]
    fn malformed_keys_and_values_are_rejected() {
        let config = config();
        assert!(config.query_attribute("").is_err());
        assert!(config.query_attribute(".greet").is_err());
        assert!(config.query_attribute(".missing.concurrents").is_err());

        let err = config
            .update_attribute(ATTR_WEIGHT, Some("heavy"), true)
            .expect_err("权重必须为整数");
        assert_eq!(err.code(), crate::error::codes::CONFIG_INVALID);
        assert_eq!(config.query_attribute(ATTR_WEIGHT).expect("合法键"), None);
    }

    #[test]
    fn notify_dispatches_to_current_listener_only() {
        let config = config();
        config
            .notify(&ConfigChange::AttributesUpdated(BTreeMap::new()))
            .expect("未挂载监听器时静默忽略");

        let listener = Arc::new(CountingListener::default());
        config.set_config_listener(Some(listener.clone()));
        config
            .notify(&ConfigChange::Replaced(BTreeMap::new()))
            .expect("全量替换");
        config
            .notify(&ConfigChange::AttributesUpdated(BTreeMap::new()))
            .expect("属性增量");
        config.set_config_listener(None);
        config
            .notify(&ConfigChange::AttributesUpdated(BTreeMap::new()))
            .expect("已清除");

        assert_eq!(listener.replaced.load(Ordering::SeqCst), 1);
        assert_eq!(listener.updated.load(Ordering::SeqCst), 1);
    }
}
