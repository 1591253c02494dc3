//! 方法参数类型缓存。
//!
//! 发布时按“接口名 + 方法名”记录参数类型，供请求分发层反序列化参数时查询。
//! 同名重载方法以最后一次写入为准。

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::interface::MethodDescriptor;

/// 进程级的方法参数类型缓存。
#[derive(Debug, Default)]
pub struct MethodArgsCache {
    entries: DashMap<(String, String), Arc<[String]>>,
}

impl MethodArgsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例。
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<MethodArgsCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// 记录方法的参数类型。
    pub fn cache(&self, interface_id: &str, method: &MethodDescriptor) {
        let types: Arc<[String]> = method
            .param_types()
            .iter()
            .map(|ty| ty.to_string())
            .collect();
        self.entries
            .insert((interface_id.to_owned(), method.name().to_owned()), types);
    }

    /// 查询方法的参数类型。
    pub fn get(&self, interface_id: &str, method_name: &str) -> Option<Arc<[String]>> {
        self.entries
            .get(&(interface_id.to_owned(), method_name.to_owned()))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
