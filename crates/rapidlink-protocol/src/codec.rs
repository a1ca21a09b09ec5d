//! 帧编码与应答解码
//!
//! 出线帧 = 两位操作码 + 空格分隔的定宽有符号定点十进制字段 + 终止符 `#`。
//! 字段宽度按类别固定，与控制器侧定宽解析器字节级兼容：
//!
//! - 位姿线性字段：宽 8、1 位小数（线性换算后）
//! - 四元数字段：宽 8、5 位小数（不换算）
//! - 关节/外部轴字段：宽 8、2 位小数
//! - 速度字段：线性 1 位小数、角度 2 位小数
//! - 转弯区字段：宽 8、4 位小数
//!
//! 应答按空白切分：首 token 为操作码回显，次 token 为状态，其余为载荷。

use crate::types::{JointAngles, Opcode, Pose, Speed, UnitSystem, Zone};
use crate::ProtocolError;
use std::fmt::Write as _;

/// 帧终止符
pub const TERMINATOR: u8 = b'#';

/// 状态 token 的成功值
pub const STATUS_OK: i32 = 1;

/// 单应答读取的最大载荷（阻塞读的上限）
pub const MAX_RESPONSE_LEN: usize = 4096;

// ==================== 编码 ====================

/// 位姿字段序列（不含操作码与终止符），线性字段先换算
fn pose_fields(units: &UnitSystem, pose: &Pose) -> String {
    let mut out = String::new();
    for value in pose.position {
        let _ = write!(out, "{:+08.1} ", units.to_wire_linear(value));
    }
    for value in pose.orientation {
        let _ = write!(out, "{:+08.5} ", value);
    }
    out
}

/// 位姿类操作帧（01/06/07/30/35/36 共用同一字段布局）
pub fn encode_pose_op(opcode: Opcode, units: &UnitSystem, pose: &Pose) -> String {
    format!("{opcode} {}#", pose_fields(units, pose))
}

/// 无参查询帧（`"NN #"`）
pub fn encode_query(opcode: Opcode) -> String {
    format!("{opcode} #")
}

/// 关节移动帧，角度字段换算到线上单位
pub fn encode_set_joints(units: &UnitSystem, joints: &JointAngles) -> String {
    let mut msg = format!("{} ", Opcode::SetJoints);
    for value in joints.0 {
        let _ = write!(msg, "{:+08.2} ", units.to_wire_angle(value));
    }
    msg.push(TERMINATOR as char);
    msg
}

/// 速度设定帧
pub fn encode_set_speed(speed: &Speed) -> String {
    format!(
        "{} {:+08.1} {:+08.2} {:+08.1} {:+08.2} #",
        Opcode::SetSpeed,
        speed.tcp_linear,
        speed.tcp_angular,
        speed.ext_linear,
        speed.ext_angular,
    )
}

/// 转弯区设定帧：点动标志 + 三元组
pub fn encode_set_zone(zone: &Zone) -> String {
    format!(
        "{} {} {:+08.4} {:+08.4} {:+08.4} #",
        Opcode::SetZone,
        zone.point_motion as u8,
        zone.pzone_tcp,
        zone.pzone_ori,
        zone.zone_ori,
    )
}

/// 外部轴设定帧，原始单位，不经单位制换算
pub fn encode_set_external_axis(axes: &[f64; 6]) -> String {
    let mut msg = format!("{} ", Opcode::SetExternalAxis);
    for value in axes {
        let _ = write!(msg, "{:+08.2} ", value);
    }
    msg.push(TERMINATOR as char);
    msg
}

/// 数字 IO 设定帧，布尔压成 0/1
pub fn encode_set_dio(value: bool) -> String {
    format!("{} {} #", Opcode::SetDio, value as u8)
}

// ==================== 解码 ====================

/// 应答文本按空白切分并全部按浮点解析
fn parse_values(raw: &str) -> Result<Vec<f64>, ProtocolError> {
    raw.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| ProtocolError::BadResponse {
                reason: format!("non-numeric token {token:?}"),
                raw: raw.to_string(),
            })
        })
        .collect()
}

fn payload(raw: &str, expected: usize) -> Result<Vec<f64>, ProtocolError> {
    let values = parse_values(raw)?;
    // token 0 = 操作码回显，token 1 = 状态
    if values.len() < expected + 2 {
        return Err(ProtocolError::BadResponse {
            reason: format!("expected {expected} payload values, got {}", values.len().saturating_sub(2)),
            raw: raw.to_string(),
        });
    }
    Ok(values[2..2 + expected].to_vec())
}

/// 应答状态 token（第二个字段）
pub fn decode_status(raw: &str) -> Result<i32, ProtocolError> {
    let token = raw
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ProtocolError::BadResponse {
            reason: "missing status token".to_string(),
            raw: raw.to_string(),
        })?;
    token
        .parse::<f64>()
        .map(|v| v as i32)
        .map_err(|_| ProtocolError::BadResponse {
            reason: format!("non-numeric status token {token:?}"),
            raw: raw.to_string(),
        })
}

/// 当前位姿应答：3 位置 + 4 姿态，位置按单位制反换算
pub fn decode_cartesian(units: &UnitSystem, raw: &str) -> Result<Pose, ProtocolError> {
    let values = payload(raw, 7)?;
    Ok(Pose {
        position: [
            units.from_wire_linear(values[0]),
            units.from_wire_linear(values[1]),
            units.from_wire_linear(values[2]),
        ],
        orientation: [values[3], values[4], values[5], values[6]],
    })
}

/// 当前关节角应答：6 角度，按单位制反换算
pub fn decode_joints(units: &UnitSystem, raw: &str) -> Result<JointAngles, ProtocolError> {
    let values = payload(raw, 6)?;
    let mut joints = [0.0; 6];
    for (out, value) in joints.iter_mut().zip(values) {
        *out = units.from_wire_angle(value);
    }
    Ok(JointAngles(joints))
}

/// 外部轴应答：6 原始值，不换算
pub fn decode_external_axis(raw: &str) -> Result<[f64; 6], ProtocolError> {
    let values = payload(raw, 6)?;
    let mut axes = [0.0; 6];
    axes.copy_from_slice(&values);
    Ok(axes)
}

/// 远端缓冲长度应答
pub fn decode_buffer_len(raw: &str) -> Result<usize, ProtocolError> {
    let values = payload(raw, 1)?;
    Ok(values[0] as usize)
}

/// 机器人信息应答：`*` 分隔的标识符列表（非数字载荷）
///
/// 前 5 字节为操作码回显与状态（`"98 1 "`），其后才是载荷文本。
pub fn decode_robotinfo(raw: &str) -> Result<Vec<String>, ProtocolError> {
    let trimmed = raw.trim_end();
    match trimmed.get(5..) {
        Some(payload) if !payload.is_empty() => {
            Ok(payload.split('*').map(str::to_string).collect())
        }
        _ => Err(ProtocolError::BadResponse {
            reason: "robotinfo payload missing".to_string(),
            raw: raw.to_string(),
        }),
    }
}
