//! # settings：声明式发布配置
//!
//! ## 设计目的（Why）
//! - 运维侧以 TOML 文件描述“发布哪个接口、发布到哪些服务器与注册中心、携带哪些属性”；
//! - 接口描述与实现对象属于代码侧，无法出现在文件中，因此由 [`ServiceManifest::assemble`]
//!   把文件内容与代码侧对象合并为运行期的 [`ProviderConfig`]。
//!
//! ## 文件结构（What）
//! ```toml
//! [provider]
//! interface = "com.example.EchoService"
//! unique_id = "v1"
//! app_name = "demo"
//! servers = ["bolt"]
//! registries = ["zk"]
//!
//! [provider.attributes]
//! tags = "blue"
//!
//! [[server]]
//! id = "bolt"
//! protocol = "bolt"
//! port = 12200
//!
//! [[registry]]
//! id = "zk"
//! protocol = "zookeeper"
//! address = "127.0.0.1:2181"
//! ```
//!
//! ## 契约（How）
//! - 服务器与注册中心按 `id` 引用，引用不存在的 `id` 或协议未在 [`Extensions`] 中登记均返回
//!   [`ProviderError::Configuration`]；
//! - 同一份清单装配出的服务器配置在多个服务之间不共享，跨服务共享需在代码侧复用 `Arc<ServerConfig>`。

use std::{
    collections::{BTreeMap, HashMap},
    fmt, fs,
    path::Path,
    sync::Arc,
    time::Duration,
};

use serde::Deserialize;

use super::{ProviderConfig, RegistryConfig, ServerConfig};
use crate::{
    error::{ProviderError, Result},
    interface::{ServiceInterface, ServiceRef},
    policy::ALL_METHODS,
    registry::RegistryFactory,
    server::ServerFactory,
};

/// 单个服务器的声明。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    pub id: String,
    #[serde(default = "default_server_protocol")]
    pub protocol: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl ServerSettings {
    /// 以 `id` 与协议构造，其余字段取默认值（`0.0.0.0`、端口 0、自动启动）。
    pub fn new(id: impl Into<String>, protocol: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            protocol: protocol.into(),
            host: default_host(),
            port: 0,
            auto_start: true,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}

/// 单个注册中心的声明。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrySettings {
    pub id: String,
    pub protocol: String,
    pub address: String,
}

impl RegistrySettings {
    pub fn new(
        id: impl Into<String>,
        protocol: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            protocol: protocol.into(),
            address: address.into(),
        }
    }
}

/// 服务提供方的声明。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    pub interface: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default = "default_include")]
    pub include: String,
    #[serde(default)]
    pub exclude: String,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default = "default_repeated_export_limit")]
    pub repeated_export_limit: i32,
    #[serde(default = "default_true")]
    pub register: bool,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub registries: Vec<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 一份完整的发布清单。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceManifest {
    pub provider: ProviderSettings,
    #[serde(default, rename = "server")]
    pub servers: Vec<ServerSettings>,
    #[serde(default, rename = "registry")]
    pub registries: Vec<RegistrySettings>,
}

impl ServiceManifest {
    /// 解析 TOML 文本。
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|err| ProviderError::configuration("manifest", "<toml>", err.to_string()))
    }

    /// 读取并解析 TOML 文件。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            ProviderError::configuration("manifest", path.display().to_string(), err.to_string())
        })?;
        Self::from_toml_str(&text)
    }

    /// 结合接口描述、实现对象与协议扩展表，装配运行期配置。
    ///
    /// # 教案式说明
    /// - **前置条件**：`interface.id()` 必须与清单中的 `provider.interface` 一致；
    /// - **执行逻辑 (How)**：
    ///   1. 按 `provider.servers` 的顺序解析服务器声明，经扩展表取得工厂；
    ///   2. 同样方式解析注册中心声明；
    ///   3. 写入黑白名单、延迟、重复发布上限、注册开关与初始属性；
    /// - **后置条件**：返回的配置尚未校验实现与接口是否匹配，该检查在发布时进行。
    pub fn assemble(
        &self,
        interface: ServiceInterface,
        service_ref: ServiceRef,
        extensions: &Extensions,
    ) -> Result<Arc<ProviderConfig>> {
        let provider = &self.provider;
        if provider.interface != interface.id() {
            return Err(ProviderError::configuration(
                "interface",
                provider.interface.clone(),
                format!("manifest does not describe interface {}", interface.id()),
            ));
        }

        let servers = provider
            .servers
            .iter()
            .map(|id| -> Result<Arc<ServerConfig>> {
                let settings = self
                    .servers
                    .iter()
                    .find(|server| &server.id == id)
                    .ok_or_else(|| {
                        ProviderError::configuration(
                            "provider.servers",
                            id.clone(),
                            "unknown server id",
                        )
                    })?;
                let factory = extensions.server_factory(&settings.protocol)?;
                Ok(Arc::new(ServerConfig::new(settings.clone(), factory)))
            })
            .collect::<Result<Vec<_>>>()?;

        let registries = provider
            .registries
            .iter()
            .map(|id| -> Result<Arc<RegistryConfig>> {
                let settings = self
                    .registries
                    .iter()
                    .find(|registry| &registry.id == id)
                    .ok_or_else(|| {
                        ProviderError::configuration(
                            "provider.registries",
                            id.clone(),
                            "unknown registry id",
                        )
                    })?;
                let factory = extensions.registry_factory(&settings.protocol)?;
                Ok(Arc::new(RegistryConfig::new(settings.clone(), factory)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut builder = ProviderConfig::builder(interface)
            .service_ref(service_ref)
            .servers(servers)
            .registries(registries)
            .include(provider.include.clone())
            .exclude(provider.exclude.clone())
            .delay(Duration::from_millis(provider.delay_ms))
            .repeated_export_limit(provider.repeated_export_limit)
            .register(provider.register);
        if let Some(id) = &provider.id {
            builder = builder.id(id.clone());
        }
        if let Some(unique_id) = &provider.unique_id {
            builder = builder.unique_id(unique_id.clone());
        }
        if let Some(app_name) = &provider.app_name {
            builder = builder.app_name(app_name.clone());
        }
        for (key, value) in &provider.attributes {
            builder = builder.attribute(key.clone(), value.clone());
        }
        Ok(builder.build())
    }
}

/// 协议 → 工厂的扩展表。
#[derive(Clone, Default)]
pub struct Extensions {
    servers: HashMap<String, Arc<dyn ServerFactory>>,
    registries: HashMap<String, Arc<dyn RegistryFactory>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记服务器协议，同名协议以后登记者为准。
    #[must_use]
    pub fn with_server_factory(
        mut self,
        protocol: impl Into<String>,
        factory: Arc<dyn ServerFactory>,
    ) -> Self {
        self.servers.insert(protocol.into(), factory);
        self
    }

    /// 登记注册中心协议，同名协议以后登记者为准。
    #[must_use]
    pub fn with_registry_factory(
        mut self,
        protocol: impl Into<String>,
        factory: Arc<dyn RegistryFactory>,
    ) -> Self {
        self.registries.insert(protocol.into(), factory);
        self
    }

    pub fn server_factory(&self, protocol: &str) -> Result<Arc<dyn ServerFactory>> {
        self.servers.get(protocol).cloned().ok_or_else(|| {
            ProviderError::configuration(
                "server.protocol",
                protocol,
                "no server factory registered",
            )
        })
    }

    pub fn registry_factory(&self, protocol: &str) -> Result<Arc<dyn RegistryFactory>> {
        self.registries.get(protocol).cloned().ok_or_else(|| {
            ProviderError::configuration(
                "registry.protocol",
                protocol,
                "no registry factory registered",
            )
        })
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut servers: Vec<_> = self.servers.keys().collect();
        servers.sort_unstable();
        let mut registries: Vec<_> = self.registries.keys().collect();
        registries.sort_unstable();
        f.debug_struct("Extensions")
            .field("servers", &servers)
            .field("registries", &registries)
            .finish()
    }
}

fn default_server_protocol() -> String {
    "bolt".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_include() -> String {
    ALL_METHODS.to_owned()
}

fn default_repeated_export_limit() -> i32 {
    1
}

fn default_true() -> bool {
    true
}
