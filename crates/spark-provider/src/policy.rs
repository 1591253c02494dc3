//! # policy：方法级访问策略
//!
//! ## 核心意图（Why）
//! - 服务可按方法发布：`include` 为白名单，`exclude` 为黑名单，二者均为逗号分隔的方法名列表；
//! - 每次发布都对接口的完整方法集重新扫描一次，结果在该次发布期间不可变。
//!
//! ## 匹配规则（What）
//! - 名单按逗号切分为词元，方法名必须与某个词元**完全相等**，`get` 不会命中 `getAll`；
//! - `include` 为空、为 `*` 或为 `all` 时不启用白名单；
//! - 以名称为键，重载方法共享同一判定，首次出现者生效，之后每遇到一次同名方法记录一条告警。

use std::collections::{HashMap, hash_map::Entry};

use tracing::warn;

use crate::{interface::ServiceInterface, reflect::MethodArgsCache};

/// 表示“全部方法”的通配符。
pub const ALL_METHODS: &str = "*";

/// 与 [`ALL_METHODS`] 等价的文字写法。
pub const ALL_METHODS_WORD: &str = "all";

/// 判定单个方法是否可被远程调用。
///
/// # 教案式说明
/// - **执行逻辑 (How)**：
///   1. 白名单启用时，方法名不在白名单内直接拒绝；
///   2. 黑名单为空则放行，否则方法名在黑名单内时拒绝；
/// - **契约 (What)**：比较基于完整词元，词元两侧空白会被忽略。
pub fn in_list(include: &str, exclude: &str, method_name: &str) -> bool {
    if !is_wildcard(include) && !contains_token(include, method_name) {
        return false;
    }
    if exclude.trim().is_empty() {
        return true;
    }
    !contains_token(exclude, method_name)
}

fn is_wildcard(include: &str) -> bool {
    let include = include.trim();
    include.is_empty() || include == ALL_METHODS || include.eq_ignore_ascii_case(ALL_METHODS_WORD)
}

fn contains_token(list: &str, method_name: &str) -> bool {
    list.split(',').any(|token| token.trim() == method_name)
}

/// 一次发布所解析出的方法访问策略。
///
/// # 教案式说明
/// - **意图 (Why)**：服务端分发请求时按方法名快速判定是否允许调用；
/// - **契约 (What)**：仅包含接口声明过的方法；未声明的方法一律视为不可调用；
/// - **风险 (Trade-offs)**：以名称为键无法区分重载方法，解析时会输出告警提示。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodAccessPolicy {
    limits: HashMap<String, bool>,
    overloaded: Vec<String>,
}

impl MethodAccessPolicy {
    /// 扫描接口的全部方法并生成策略，同时把各方法的参数类型写入 `args_cache`。
    pub fn resolve(
        interface: &ServiceInterface,
        include: &str,
        exclude: &str,
        app_name: &str,
        args_cache: &MethodArgsCache,
    ) -> Self {
        let mut limits = HashMap::with_capacity(interface.methods().len());
        let mut overloaded = Vec::new();
        for method in interface.methods() {
            let name = method.name();
            match limits.entry(name.to_owned()) {
                Entry::Occupied(_) => {
                    warn!(
                        app = app_name,
                        "Method with same name \"{}.{}\" exists ! The usage of overloading method in rpc is deprecated.",
                        interface.id(),
                        name
                    );
                    if !overloaded.iter().any(|existing| existing == name) {
                        overloaded.push(name.to_owned());
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(in_list(include, exclude, name));
                }
            }
            args_cache.cache(interface.id(), method);
        }
        Self { limits, overloaded }
    }

    /// 方法是否允许远程调用。
    pub fn is_allowed(&self, method_name: &str) -> bool {
        self.limits.get(method_name).copied().unwrap_or(false)
    }

    /// 允许调用的方法名，按字典序返回。
    pub fn allowed_methods(&self) -> Vec<&str> {
        let mut allowed: Vec<&str> = self
            .limits
            .iter()
            .filter(|(_, allowed)| **allowed)
            .map(|(name, _)| name.as_str())
            .collect();
        allowed.sort_unstable();
        allowed
    }

    /// 出现过重载的方法名，按首次重复的顺序返回。
    pub fn overloaded(&self) -> &[String] {
        &self.overloaded
    }

    /// 已解析的方法名数量（重载方法只计一次）。
    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tracing_test::traced_test;

    use super::*;
    use crate::interface::MethodDescriptor;

    trait Catalog {}

    fn catalog_interface() -> ServiceInterface {
        ServiceInterface::of::<dyn Catalog>(
            "com.example.Catalog",
            [
                MethodDescriptor::new("foo", ["String"]),
                MethodDescriptor::new("bar", ["u32"]),
                MethodDescriptor::nullary("get"),
                MethodDescriptor::nullary("getAll"),
            ],
        )
    }

    fn resolve(include: &str, exclude: &str) -> MethodAccessPolicy {
        MethodAccessPolicy::resolve(
            &catalog_interface(),
            include,
            exclude,
            "demo",
            &MethodArgsCache::new(),
        )
    }

    #[test]
    fn whitelist_allows_only_listed_methods() {
        let policy = resolve("foo,bar", "");
        assert_eq!(policy.allowed_methods(), ["bar", "foo"]);
        assert!(!policy.is_allowed("get"));
    }

    #[test]
    fn wildcard_with_blacklist_denies_only_listed_methods() {
        for include in ["all", "*", ""] {
            let policy = resolve(include, "bar");
            assert_eq!(policy.allowed_methods(), ["foo", "get", "getAll"], "include={include}");
        }
    }

    #[test]
    fn token_match_is_exact() {
        assert!(!in_list("get", "", "getAll"));
        assert!(in_list("get", "", "get"));
        assert!(in_list("all", "get", "getAll"));
        assert!(!in_list("all", " foo , get ", "get"));
        assert!(!in_list("forget", "", "get"));
    }

    #[test]
    fn undeclared_methods_are_denied() {
        assert!(!resolve("*", "").is_allowed("missing"));
    }

    #[test]
    #[traced_test]
    fn overloaded_names_share_first_decision_and_warn() {
        trait Overloaded {}
        let interface = ServiceInterface::of::<dyn Overloaded>(
            "com.example.Overloaded",
            [
                MethodDescriptor::new("say", ["String"]),
                MethodDescriptor::new("say", ["String", "u32"]),
                MethodDescriptor::new("say", ["u8"]),
                MethodDescriptor::nullary("ping"),
            ],
        );
        let cache = MethodArgsCache::new();
        let policy = MethodAccessPolicy::resolve(&interface, "say", "", "demo", &cache);

        assert!(policy.is_allowed("say"));
        assert!(!policy.is_allowed("ping"));
        assert_eq!(policy.len(), 2);
        assert_eq!(policy.overloaded(), ["say".to_owned()]);
        assert!(logs_contain(
            "Method with same name \"com.example.Overloaded.say\" exists"
        ));
        assert_eq!(
            cache.get("com.example.Overloaded", "say").as_deref(),
            Some(&["u8".to_owned()][..])
        );
        assert!(cache.get("com.example.Overloaded", "ping").is_some());
    }

    proptest! {
        #[test]
        fn prefix_never_matches_longer_name(prefix in "[a-z]{1,8}", suffix in "[A-Za-z]{1,8}") {
            prop_assume!(prefix != ALL_METHODS_WORD);
            let longer = format!("{prefix}{suffix}");
            prop_assert!(!in_list(&prefix, "", &longer));
            prop_assert!(in_list("*", &prefix, &longer));
            let list = format!("{longer},{prefix}");
            prop_assert!(in_list(&list, "", &longer));
        }
    }
}
