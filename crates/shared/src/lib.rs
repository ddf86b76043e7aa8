//! 共享库
//!
//! 包含订单结算服务共用的配置、错误处理、Redis 消息队列、
//! 分布式锁、重试与死信等基础设施代码。

pub mod config;
pub mod dlq;
pub mod error;
pub mod lock;
pub mod observability;
pub mod redis_mq;
pub mod retry;
