//! # ExportKeyRegistry：发布键引用计数表
//!
//! ## 核心意图（Why）
//! - 同一逻辑服务（接口 + 限定）允许被多个配置实例重复发布，例如发布到不同服务器；
//!   计数表记录当前存活的发布次数，并据此执行重复发布上限；
//! - 进程级单例，启动时为空，不做持久化。
//!
//! ## 行为契约（What）
//! - [`acquire`](ExportKeyRegistry::acquire)：在同一分片锁内完成“加一并检查上限”，超限时计数保持不变；
//! - [`release`](ExportKeyRegistry::release)：减一，归零即移除条目；
//! - 不同键之间互不阻塞，同键操作由 `DashMap` 分片锁串行化，不会丢失更新。

use std::sync::{Arc, OnceLock};

use dashmap::{DashMap, mapref::entry::Entry};

use crate::{
    error::{ProviderError, Result},
    identity::ProviderIdentity,
};

/// 发布键 → 存活发布次数。
#[derive(Debug, Default)]
pub struct ExportKeyRegistry {
    counters: DashMap<ProviderIdentity, usize>,
}

impl ExportKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例。
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<ExportKeyRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// 为 `key` 登记一次发布，返回登记后的计数。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：`limit > 0` 且新计数超过 `limit` 时返回
    ///   [`ProviderError::DuplicateExport`]，计数停留在原值；`limit <= 0` 表示不限制；
    /// - **执行逻辑 (How)**：借助 `entry` 持有分片写锁，读取、比较、写回在同一临界区完成。
    pub fn acquire(&self, key: &ProviderIdentity, limit: i32) -> Result<usize> {
        let mut counter = self.counters.entry(key.clone()).or_insert(0);
        let next = *counter + 1;
        let limit = usize::try_from(limit).unwrap_or(0);
        if limit > 0 && next > limit {
            return Err(ProviderError::DuplicateExport {
                key: key.to_string(),
                limit,
            });
        }
        *counter = next;
        Ok(next)
    }

    /// 撤销一次发布，返回剩余计数；计数归零时条目被移除。
    pub fn release(&self, key: &ProviderIdentity) -> usize {
        match self.counters.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let remaining = occupied.get().saturating_sub(1);
                if remaining == 0 {
                    occupied.remove();
                } else {
                    *occupied.get_mut() = remaining;
                }
                remaining
            }
            Entry::Vacant(_) => 0,
        }
    }

    /// 当前计数，不存在时为 `0`。
    pub fn count(&self, key: &ProviderIdentity) -> usize {
        self.counters.get(key).map(|counter| *counter).unwrap_or(0)
    }

    /// 条目是否存在。
    pub fn contains(&self, key: &ProviderIdentity) -> bool {
        self.counters.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn key() -> ProviderIdentity {
        ProviderIdentity::new("com.example.EchoService", Some("v1"))
    }

    #[test]
    fn limit_exceeded_leaves_counter_untouched() {
        let registry = ExportKeyRegistry::new();
        assert_eq!(registry.acquire(&key(), 2).expect("第一次发布"), 1);
        assert_eq!(registry.acquire(&key(), 2).expect("第二次发布"), 2);

        let err = registry.acquire(&key(), 2).expect_err("第三次发布应超限");
        assert!(matches!(err, ProviderError::DuplicateExport { limit: 2, .. }));
        assert_eq!(registry.count(&key()), 2);
    }

    #[test]
    fn non_positive_limit_disables_check() {
        let registry = ExportKeyRegistry::new();
        for expected in 1..=5 {
            assert_eq!(registry.acquire(&key(), 0).expect("不限制"), expected);
        }
        assert_eq!(registry.acquire(&key(), -1).expect("负数同样不限制"), 6);
    }

    #[test]
    fn release_removes_entry_at_zero() {
        let registry = ExportKeyRegistry::new();
        registry.acquire(&key(), 0).expect("发布");
        registry.acquire(&key(), 0).expect("发布");

        assert_eq!(registry.release(&key()), 1);
        assert!(registry.contains(&key()));
        assert_eq!(registry.release(&key()), 0);
        assert!(!registry.contains(&key()));
        assert_eq!(registry.release(&key()), 0, "多余的撤销不应产生负数");
        assert!(registry.is_empty());
    }

    #[test]
    fn concurrent_acquire_and_release_do_not_lose_updates() {
        let registry = Arc::new(ExportKeyRegistry::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..200 {
                        registry.acquire(&key(), 0).expect("不限制");
                    }
                    for _ in 0..100 {
                        registry.release(&key());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("工作线程不应 panic");
        }
        assert_eq!(registry.count(&key()), 8 * 100);
    }
}
