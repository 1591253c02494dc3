//! 服务提供方的逻辑标识。

use std::{fmt, sync::Arc};

/// `ProviderIdentity` 由接口名与可选的唯一限定（分组/版本）组成。
///
/// # 教案式说明
/// - **意图 (Why)**：同一接口可能以不同限定发布多次，引用计数、服务器与注册中心绑定都需要
///   一个与实例无关的稳定键；
/// - **契约 (What)**：无限定时键为接口名，否则为 `接口名:限定`；空白限定等价于无限定；
///   构造后不可变，克隆只增加引用计数。
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderIdentity(Arc<str>);

impl ProviderIdentity {
    /// 依据接口名与限定构造标识。
    pub fn new(interface_id: &str, unique_id: Option<&str>) -> Self {
        let key = match unique_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(unique_id) => format!("{interface_id}:{unique_id}"),
            None => interface_id.to_owned(),
        };
        Self(Arc::from(key))
    }

    /// 以字符串形式访问标识。
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProviderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProviderIdentity").field(&self.as_str()).finish()
    }
}
