//! # config：发布配置与配置变更通道
//!
//! ## 定位与职责（Why）
//! - `ProviderConfig` 是发布流程消费的配置对象：接口、实现、服务器与注册中心列表、方法黑白名单、
//!   重复发布上限，以及可热更新的属性表；
//! - 配置对象同时是变更通道：同一时刻只挂载一个 [`ConfigListener`]，由配置子系统在属性变化时回调。
//!
//! ## 架构嵌入（Where）
//! - `provider`/`server`/`registry` 为运行期配置对象，以 `Arc` 在发布器、服务器、注册中心之间共享；
//! - `settings` 为声明式配置（TOML），负责把文件内容装配为运行期配置对象。

use std::collections::BTreeMap;

use crate::error::Result;

mod provider;
mod registry;
mod server;
pub mod settings;

pub use provider::{
    ATTR_CONCURRENTS, ATTR_TAGS, ATTR_TIMEOUT, ATTR_WEIGHT, ProviderConfig, ProviderConfigBuilder,
};
pub use registry::RegistryConfig;
pub use server::ServerConfig;
pub use settings::{Extensions, ProviderSettings, RegistrySettings, ServerSettings, ServiceManifest};

/// 配置变更的两种通知形态。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigChange {
    /// 全量替换。
    Replaced(BTreeMap<String, String>),
    /// 属性增量：键 → 新值，`None` 表示删除该属性。
    AttributesUpdated(BTreeMap<String, Option<String>>),
}

/// 配置变更监听器。
///
/// # 教案式说明
/// - **意图 (Why)**：配置子系统只认识监听器契约，不关心监听者如何响应（例如重新发布）；
/// - **契约 (What)**：
///   - `config_changed` 接收全量替换通知；
///   - `attr_updated` 接收属性增量，返回值交回通知方，便于其记录或重试；
///   - 实现必须 `Send + Sync`，回调可能来自任意线程。
pub trait ConfigListener: Send + Sync {
    /// 全量替换通知。
    fn config_changed(&self, new_value: &BTreeMap<String, String>);

    /// 属性增量通知。
    fn attr_updated(&self, new_values: &BTreeMap<String, Option<String>>) -> Result<()>;
}
