//! 结算锁
//!
//! 同一用户的分销结算必须串行：先查分销商是否存在，再决定创建还是升级。
//! 多实例部署时由 Redis 键互斥，Redis 不可用时退回进程内互斥。

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use redis::{Client, Script};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::LockSettings;
use crate::error::{MallError, Result};

/// Redis 中锁键的前缀
const KEY_PREFIX: &str = "lock:";

/// 值与持有者一致时才删除
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
end
return 0
"#;

/// 锁参数
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Redis 键过期时间，也是进程内等待的上限
    pub default_ttl: Duration,
    /// Redis 锁被占用时的尝试次数
    pub retry_count: u32,
    pub retry_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self::from(&LockSettings::default())
    }
}

impl From<&LockSettings> for LockConfig {
    fn from(settings: &LockSettings) -> Self {
        Self {
            default_ttl: Duration::from_secs(settings.ttl_seconds),
            retry_count: settings.retry_count,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }
}

type Waiters = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// 锁管理器
///
/// Redis 命令出错时当次获取降级为进程内互斥，只保证本实例内串行。
pub struct LockManager {
    redis: Option<Client>,
    waiters: Waiters,
    config: LockConfig,
    /// 本进程的标识，作为持有者值的前缀
    process_id: Uuid,
}

impl LockManager {
    pub fn new(redis: Option<Client>, config: LockConfig) -> Self {
        Self {
            redis,
            waiters: Arc::new(DashMap::new()),
            config,
            process_id: Uuid::new_v4(),
        }
    }

    /// 不连接 Redis
    pub fn local(config: LockConfig) -> Self {
        Self::new(None, config)
    }

    /// 获取 `key` 上的锁
    ///
    /// Redis 锁在尝试次数用完后仍被占用，或进程内锁等待超过 ttl，均返回 `LockConflict`。
    #[instrument(skip(self), fields(process_id = %self.process_id))]
    pub async fn acquire(&self, key: &str, ttl: Option<Duration>) -> Result<LockGuard> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let owner = format!("{}:{}", self.process_id, Uuid::new_v4());

        let Some(client) = self.redis.as_ref() else {
            return self.wait_local(key, owner, ttl).await;
        };

        let tries = self.config.retry_count.max(1);
        for attempt in 1..=tries {
            match set_if_absent(client, key, &owner, ttl).await {
                Ok(true) => {
                    debug!(key, attempt, "已获取 Redis 锁");
                    return Ok(LockGuard {
                        key: key.to_string(),
                        owner,
                        held: Held::Redis {
                            client: client.clone(),
                            released: false,
                        },
                    });
                }
                Ok(false) if attempt < tries => {
                    debug!(key, attempt, "Redis 锁被占用，等待后重试");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Ok(false) => break,
                Err(e) => {
                    warn!(key, error = %e, "Redis 锁不可用，改用进程内锁");
                    return self.wait_local(key, owner, ttl).await;
                }
            }
        }

        Err(MallError::LockConflict {
            resource: key.to_string(),
        })
    }

    async fn wait_local(&self, key: &str, owner: String, ttl: Duration) -> Result<LockGuard> {
        let mutex = self
            .waiters
            .entry(key.to_string())
            .or_default()
            .value()
            .clone();

        let guard = tokio::time::timeout(ttl, mutex.lock_owned())
            .await
            .map_err(|_| MallError::LockConflict {
                resource: key.to_string(),
            })?;

        debug!(key, "已获取进程内锁");
        Ok(LockGuard {
            key: key.to_string(),
            owner,
            held: Held::Local {
                guard: Some(guard),
                waiters: self.waiters.clone(),
            },
        })
    }
}

async fn set_if_absent(
    client: &Client,
    key: &str,
    owner: &str,
    ttl: Duration,
) -> std::result::Result<bool, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let reply: Option<String> = redis::cmd("SET")
        .arg(format!("{KEY_PREFIX}{key}"))
        .arg(owner)
        .arg("NX")
        .arg("PX")
        .arg(ttl.as_millis() as u64)
        .query_async(&mut conn)
        .await?;
    Ok(reply.is_some())
}

/// 已持有的锁
///
/// Redis 锁应调用 `release()`；未释放时等键过期。进程内锁在 Drop 时归还。
pub struct LockGuard {
    key: String,
    owner: String,
    held: Held,
}

enum Held {
    Redis {
        client: Client,
        released: bool,
    },
    Local {
        guard: Option<OwnedMutexGuard<()>>,
        waiters: Waiters,
    },
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 持有者值，格式为 `{进程标识}:{本次获取标识}`
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[instrument(skip(self), fields(key = %self.key))]
    pub async fn release(mut self) -> Result<()> {
        match &mut self.held {
            Held::Redis { client, released } => {
                *released = true;
                let mut conn = client.get_multiplexed_async_connection().await?;
                let deleted: i32 = Script::new(RELEASE_SCRIPT)
                    .key(format!("{KEY_PREFIX}{}", self.key))
                    .arg(&self.owner)
                    .invoke_async(&mut conn)
                    .await?;
                if deleted == 0 {
                    warn!(owner = %self.owner, "锁已过期或被他人持有，未删除");
                } else {
                    debug!("已释放 Redis 锁");
                }
                Ok(())
            }
            Held::Local { guard, waiters } => {
                unlock_local(&self.key, guard, waiters);
                Ok(())
            }
        }
    }
}

fn unlock_local(key: &str, guard: &mut Option<OwnedMutexGuard<()>>, waiters: &Waiters) {
    if guard.take().is_none() {
        return;
    }
    // 引用计数为 1 表示只有登记表还指向它
    waiters.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    debug!(key, "已释放进程内锁");
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match &mut self.held {
            Held::Local { guard, waiters } => unlock_local(&self.key, guard, waiters),
            Held::Redis { released: false, .. } => {
                warn!(key = %self.key, owner = %self.owner, "Redis 锁未显式释放，将在过期后失效");
            }
            Held::Redis { .. } => {}
        }
    }
}
