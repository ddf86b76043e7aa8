//! 分布式锁模块
//!
//! 提供 Redis 优先、进程内互斥后备的锁实现，用于串行化同一用户的分销结算。
//!
//! ## 使用示例
//!
//! ```ignore
//! let lock_manager = LockManager::new(Some(client), LockConfig::default());
//!
//! let guard = lock_manager.acquire("settlement:distribution:42", None).await?;
//! settle_distribution().await?;
//! guard.release().await?;
//! ```

mod lock_manager;

pub use lock_manager::{LockConfig, LockGuard, LockManager};
