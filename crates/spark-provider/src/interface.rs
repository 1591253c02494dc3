//! # interface：服务接口描述与实现句柄
//!
//! ## 设计动机（Why）
//! - 发布流程需要“接口声明了哪些方法”以及“实现是否确实实现了该接口”两类信息；
//!   Rust 没有运行时反射，因此由调用方显式提供有序的方法描述列表；
//! - 实现对象以 trait object 形式注册，通过 `TypeId` 判定其声明的接口。
//!
//! ## 契约（What）
//! - [`ServiceInterface::of`] 与 [`ServiceRef::new`] 使用同一个接口类型参数（通常是 `dyn Trait`）
//!   时，[`ServiceInterface::is_implemented_by`] 返回 `true`；
//! - 方法列表保持声明顺序，允许同名（重载）方法出现多次。

use std::{
    any::{Any, TypeId, type_name},
    borrow::Cow,
    fmt,
    sync::Arc,
};

/// 单个方法的名称与参数类型描述。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    name: Cow<'static, str>,
    param_types: Vec<Cow<'static, str>>,
}

impl MethodDescriptor {
    /// 以方法名与参数类型列表构造描述。
    pub fn new<N, P, I>(name: N, param_types: I) -> Self
    where
        N: Into<Cow<'static, str>>,
        P: Into<Cow<'static, str>>,
        I: IntoIterator<Item = P>,
    {
        Self {
            name: name.into(),
            param_types: param_types.into_iter().map(Into::into).collect(),
        }
    }

    /// 无参数方法的便捷构造。
    pub fn nullary(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            param_types: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_types(&self) -> &[Cow<'static, str>] {
        &self.param_types
    }
}

/// 服务接口描述。
///
/// # 教案式说明
/// - **意图 (Why)**：替代反射得到的方法集合，作为方法黑白名单解析与参数类型缓存的输入；
/// - **契约 (What)**：`id` 为对外可见的接口名；`type_id` 记录接口类型，用于校验实现；
/// - **风险 (Trade-offs)**：方法列表由调用方维护，与 trait 定义不同步时只能在运行期暴露。
#[derive(Clone)]
pub struct ServiceInterface {
    id: Arc<str>,
    type_id: TypeId,
    type_name: &'static str,
    methods: Arc<[MethodDescriptor]>,
}

impl ServiceInterface {
    /// 以接口类型 `I`（通常为 `dyn Trait`）构造描述。
    pub fn of<I>(
        id: impl Into<Arc<str>>,
        methods: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Self
    where
        I: ?Sized + 'static,
    {
        Self {
            id: id.into(),
            type_id: TypeId::of::<I>(),
            type_name: type_name::<I>(),
            methods: methods.into_iter().collect(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 接口类型的 Rust 名称，仅用于诊断输出。
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 按声明顺序返回方法描述，重载方法会重复出现。
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// 接口是否声明了指定名称的方法。
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|method| method.name() == name)
    }

    /// 判断实现句柄是否实现了本接口。
    pub fn is_implemented_by(&self, service: &ServiceRef) -> bool {
        service.interface_type == self.type_id
    }
}

impl fmt::Debug for ServiceInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInterface")
            .field("id", &self.id)
            .field("type_name", &self.type_name)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// 类型擦除后的服务实现句柄。
///
/// - 内部保存 `Arc<I>`，可通过 [`downcast`](Self::downcast) 取回；
/// - 克隆只增加引用计数。
#[derive(Clone)]
pub struct ServiceRef {
    interface_type: TypeId,
    type_name: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceRef {
    /// 以接口类型 `I` 登记实现。
    pub fn new<I>(instance: Arc<I>) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
    {
        Self {
            interface_type: TypeId::of::<I>(),
            type_name: type_name::<I>(),
            instance: Arc::new(instance),
        }
    }

    /// 登记时使用的类型名称。
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 以接口类型 `I` 取回实现；类型不符时返回 `None`。
    pub fn downcast<I>(&self) -> Option<Arc<I>>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        self.instance.downcast_ref::<Arc<I>>().cloned()
    }
}

impl fmt::Debug for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRef")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
