//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 发布流程需要协调服务器、注册中心、反射缓存等多个独立失败的协作方，
//!   必须区分“框架错误（始终向上传播）”与“协作方普通故障（可在循环内降级为日志）”；
//! - 集中定义错误语义与稳定错误码，便于日志聚合与告警。
//!
//! ## 设计要求（What）
//! - [`ProviderError::is_framework`] 是唯一的判定入口：`Collaborator` 以外的变体都视为框架错误；
//! - 错误码遵循 `<域>.<语义>` 约定，见 [`codes`]；
//! - 所有变体均满足 `Send + Sync + 'static`，可跨线程传播（延迟发布线程、配置通知线程）。

use std::{borrow::Cow, error::Error as StdError};

use thiserror::Error;

/// 底层原因的统一装箱形态，保持 `Send + Sync` 以便跨线程传递。
pub type ErrorCause = Box<dyn StdError + Send + Sync + 'static>;

/// crate 统一的返回值别名，默认错误类型为 [`ProviderError`]。
pub type Result<T, E = ProviderError> = core::result::Result<T, E>;

/// 发布流程在包装非框架错误时使用的固定消息。
pub const BUILD_PROXY_ERROR: &str = "Build provider proxy error!";

/// 稳定错误码。
pub mod codes {
    /// 参数校验失败（实现与接口不匹配、未配置服务器、非法属性值等）。
    pub const CONFIG_INVALID: &str = "provider.config.invalid";
    /// 同一逻辑服务的发布次数超过上限。
    pub const EXPORT_DUPLICATE: &str = "provider.export.duplicate";
    /// 框架运行时错误。
    pub const RUNTIME: &str = "provider.runtime";
    /// 协作方（服务器、注册中心等）的普通故障。
    pub const COLLABORATOR: &str = "provider.collaborator";
}

/// 服务发布域的错误类型。
///
/// # 教案式说明
/// - **意图 (Why)**：以和类型替代“捕获特定异常、其余一律吞掉”的控制流；调用点通过
///   [`is_framework`](Self::is_framework) 决定是立即传播还是记录日志后继续处理下一个协作方。
/// - **契约 (What)**：
///   - `Configuration`：参数校验失败，对当前发布调用是致命的，不会自动重试；
///   - `DuplicateExport`：超过重复发布上限，抛出前引用计数已回滚；
///   - `Runtime`：框架运行时错误，穿透所有层级，永不被吞掉；
///   - `Collaborator`：其它协作方故障，调用点可以降级为日志。
/// - **风险 (Trade-offs)**：协作方实现者需自行判断故障类别；误将普通故障标记为 `Runtime`
///   会导致整个发布中止。
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 配置项取值非法。
    #[error("The value of config {field} [{value}] is illegal, {detail}")]
    Configuration {
        field: Cow<'static, str>,
        value: String,
        detail: String,
    },

    /// 同一 identity 的发布次数超过 `limit`。
    #[error(
        "Duplicate provider config with key {key} has been exported more than {limit} times! \
         Maybe it's wrong config, please check it. Ignore this if you did that on purpose!"
    )]
    DuplicateExport { key: String, limit: usize },

    /// 框架运行时错误，可选携带底层原因。
    #[error("{message}")]
    Runtime {
        message: Cow<'static, str>,
        #[source]
        source: Option<ErrorCause>,
    },

    /// 协作方的普通故障。
    #[error("{context}: {source}")]
    Collaborator {
        context: Cow<'static, str>,
        #[source]
        source: ErrorCause,
    },
}

impl ProviderError {
    /// 构造参数校验错误。
    pub fn configuration(
        field: impl Into<Cow<'static, str>>,
        value: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            field: field.into(),
            value: value.into(),
            detail: detail.into(),
        }
    }

    /// 构造不带底层原因的框架运行时错误。
    pub fn runtime(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Runtime {
            message: message.into(),
            source: None,
        }
    }

    /// 构造携带底层原因的框架运行时错误。
    pub fn runtime_with_cause(
        message: impl Into<Cow<'static, str>>,
        cause: impl Into<ErrorCause>,
    ) -> Self {
        Self::Runtime {
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// 将协作方的任意错误包装为可降级的故障。
    ///
    /// - `context` 描述失败环节，例如 `"server.start"`；
    /// - 接受任何可转换为 [`ErrorCause`] 的值，包括 `String` 与 `&str`。
    pub fn collaborator(
        context: impl Into<Cow<'static, str>>,
        cause: impl Into<ErrorCause>,
    ) -> Self {
        Self::Collaborator {
            context: context.into(),
            source: cause.into(),
        }
    }

    /// 是否为必须向上传播的框架错误。
    pub fn is_framework(&self) -> bool {
        !matches!(self, Self::Collaborator { .. })
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => codes::CONFIG_INVALID,
            Self::DuplicateExport { .. } => codes::EXPORT_DUPLICATE,
            Self::Runtime { .. } => codes::RUNTIME,
            Self::Collaborator { .. } => codes::COLLABORATOR,
        }
    }

    /// 发布失败时的统一出口：框架错误原样返回，其余包装为带固定消息的运行时错误。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：发布调用方只需面对框架错误，原始故障通过 `source()` 链保留；
    /// - **契约 (What)**：返回值一定满足 `is_framework() == true`。
    pub fn into_framework(self) -> Self {
        if self.is_framework() {
            self
        } else {
            Self::runtime_with_cause(BUILD_PROXY_ERROR, self)
        }
    }
}
