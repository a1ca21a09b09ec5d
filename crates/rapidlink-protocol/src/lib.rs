//! # Rapidlink Protocol
//!
//! 机器人运动控制文本协议定义（无网络依赖）
//!
//! ## 模块
//!
//! - `types`: 位姿、关节角、速度、转弯区、单位制等协议值类型
//! - `codec`: 帧编码与应答解码
//!
//! ## 帧格式
//!
//! 协议为 ASCII 文本帧：两位操作码 + 空格分隔的定宽数字字段 +
//! 字面终止符 `#`（非长度前缀）。数字字段宽度是控制器侧定宽解析器的
//! 字节级兼容约定，由 [`codec`] 保证。

pub mod codec;
pub mod types;

// 重新导出常用类型
pub use codec::*;
pub use types::*;

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 位姿形状无法识别（既非嵌套 `[[3],[4]]` 也非平铺 7 值）
    #[error("Malformed pose: expected [[x,y,z],[q1..q4]] or a flat 7-value sequence, got {got}")]
    MalformedPose { got: String },

    /// 参数个数错误（本地校验，不触网）
    #[error("Invalid parameter count: expected {expected}, got {actual}")]
    InvalidParameterCount { expected: usize, actual: usize },

    /// 未知操作码
    #[error("Unknown opcode: {code:02}")]
    UnknownOpcode { code: u8 },

    /// 未知转弯区预设键
    #[error("Unknown zone preset: {key:?}")]
    UnknownZone { key: String },

    /// 应答文本无法按预期解码
    #[error("Bad response: {reason} (raw: {raw:?})")]
    BadResponse { reason: String, raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::InvalidParameterCount {
            expected: 6,
            actual: 4,
        };
        assert_eq!(
            format!("{}", err),
            "Invalid parameter count: expected 6, got 4"
        );

        let err = ProtocolError::UnknownOpcode { code: 7 };
        assert_eq!(format!("{}", err), "Unknown opcode: 07");
    }
}
