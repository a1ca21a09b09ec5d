//! 客户端层错误类型定义

use crate::config::ConfigError;
use rapidlink_protocol::ProtocolError;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// 客户端层错误类型
///
/// 本地校验类错误（`Protocol` 中的形状/参数个数）不触网；
/// `BufferConsistency` 与 `ViaPointRejected` 限定在当前调用，
/// 会话仍可继续使用；`ConnectionLost` 与 `SessionClosed` 为会话级失败。
#[derive(Error, Debug)]
pub enum ClientError {
    /// 协议层错误（形状校验、应答解码）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 配置加载错误
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// 建连阶段的有界等待超时
    #[error("Connect timeout after {timeout:?} to {addr}")]
    ConnectTimeout { addr: SocketAddr, timeout: Duration },

    /// 会话中途的 I/O 失败
    #[error("Connection lost: {0}")]
    ConnectionLost(#[from] std::io::Error),

    /// 远端缓冲长度与已发送数不一致（状态分歧，已先行纠正性清空）
    #[error("Remote buffer inconsistent: expected {expected} poses, controller reports {observed}")]
    BufferConsistency { expected: usize, observed: usize },

    /// 圆弧运动第一阶段被控制器拒绝，第二阶段未发送
    #[error("Circular via-point rejected by controller (status {status})")]
    ViaPointRejected { status: i32 },

    /// 会话已关闭，任何后续操作（含二次关闭）均失败
    #[error("Session already closed")]
    SessionClosed,
}
