use std::sync::Arc;

use crate::{config::ProviderConfig, identity::ProviderIdentity, policy::MethodAccessPolicy};

/// 服务端调用入口。
///
/// 绑定到服务器的处理器；方法访问策略在构造时固定，属性热更新触发的重新发布会构造新的实例。
#[derive(Debug)]
pub struct ProviderInvoker {
    config: Arc<ProviderConfig>,
    policy: Arc<MethodAccessPolicy>,
}

impl ProviderInvoker {
    pub fn new(config: Arc<ProviderConfig>, policy: Arc<MethodAccessPolicy>) -> Self {
        Self { config, policy }
    }

    pub fn config(&self) -> &Arc<ProviderConfig> {
        &self.config
    }

    pub fn identity(&self) -> &ProviderIdentity {
        self.config.identity()
    }

    pub fn policy(&self) -> &MethodAccessPolicy {
        &self.policy
    }

    /// 请求的方法是否允许被远程调用；接口未声明的方法一律拒绝。
    pub fn is_method_allowed(&self, method_name: &str) -> bool {
        self.policy.is_allowed(method_name)
    }
}
