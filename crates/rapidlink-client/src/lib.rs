//! # Rapidlink Client
//!
//! 运动客户端与遥测监听两条独立会话：
//!
//! - [`Robot`]: 持有到控制器运动端口的唯一持久连接，暴露全部机器人
//!   操作。请求路径严格一次一请求（单写者假设，并发调用方需自行串行化）。
//! - [`Telemetry`]: 独立连接到流式端口的监听器，持续把样本写入有界、
//!   可并发读取的历史环。两条会话仅通过同步的有界环形缓冲耦合。
//!
//! 仅运动连接的建立阶段有有界超时；此后所有读写均为无界阻塞。
//! 任何失败只报告一次，任何地方都不做自动重试。

pub mod config;
mod error;
pub mod robot;
pub mod telemetry;

// 重新导出常用类型
pub use config::{ConfigError, RobotConfig};
pub use error::ClientError;
pub use robot::{Robot, SessionState};
pub use telemetry::{HistoryRing, Telemetry, TelemetryError};
