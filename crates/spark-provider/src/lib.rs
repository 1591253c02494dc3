#![deny(unsafe_code)]

//! # spark-provider
//!
//! ## 定位与职责（Why）
//! - 负责 RPC 服务提供方的发布生命周期：把本地实现绑定到一个或多个网络服务器，并注册到一个或多个
//!   注册中心，使远端调用方可以发现并调用；
//! - 协调多个独立失败的协作方（服务器、注册中心、方法参数缓存），形成幂等、并发安全的状态迁移；
//! - 支持属性热更新：撤销发布 → 修改属性 → 重新发布，失败时自动回滚到旧属性。
//!
//! ## 架构嵌入（Where）
//! - `bootstrap` 是编排入口，`server`/`registry` 定义协作方契约与绑定逻辑；
//! - `config` 承载运行期配置与声明式（TOML）配置，`listener` 处理属性热更新；
//! - `export_keys`/`runtime`/`reflect` 为进程级共享表，经 [`ProviderServices`] 注入。
//!
//! ## 边界（Trade-offs）
//! - 传输协议、请求分发、注册中心的网络实现都由协作方负责，本 crate 只调用其契约；
//! - 所有操作均为同步阻塞调用，协作方自行决定超时策略。

/// 发布生命周期编排器。
pub mod bootstrap;

/// 运行期配置、配置变更通道与声明式配置。
pub mod config;

/// 错误类型与稳定错误码。
pub mod error;

/// 发布键引用计数表。
pub mod export_keys;

pub mod identity;

/// 服务接口描述与实现句柄。
pub mod interface;

pub mod invoker;

/// 属性热更新监听器。
pub mod listener;

/// 方法黑白名单解析。
pub mod policy;

pub mod reflect;

/// 注册中心契约、实例仓库与注册绑定。
pub mod registry;

/// 进程级运行态与共享表集合。
pub mod runtime;

/// 服务器契约与处理器绑定。
pub mod server;

pub mod telemetry;

pub use bootstrap::ProviderBootstrap;
pub use config::{
    ConfigChange, ConfigListener, Extensions, ProviderConfig, RegistryConfig, ServerConfig,
    ServiceManifest,
};
pub use error::{ProviderError, Result};
pub use export_keys::ExportKeyRegistry;
pub use identity::ProviderIdentity;
pub use interface::{MethodDescriptor, ServiceInterface, ServiceRef};
pub use invoker::ProviderInvoker;
pub use listener::ProviderAttributeListener;
pub use policy::MethodAccessPolicy;
pub use reflect::MethodArgsCache;
pub use registry::{Registry, RegistryFactory, RegistryRepository};
pub use runtime::{ProviderServices, RuntimeContext};
pub use server::{Server, ServerFactory};
