//! 协议值类型定义
//!
//! 包含位姿、关节角、速度、转弯区与单位制的规范表示，以及操作码枚举。
//! 所有 `TryFrom` 转换在本地完成形状校验，失败时不产生任何 I/O。

use crate::ProtocolError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

// ==================== 操作码 ====================

/// 协议操作码（两位十进制，线上以 `"NN"` 形式出现）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// 笛卡尔移动（TCP 对齐到目标位姿）
    MoveTcp = 1,
    /// 关节移动
    SetJoints = 2,
    /// 查询当前位姿
    GetCartesian = 3,
    /// 查询当前关节角
    GetJoints = 4,
    /// 查询外部轴
    GetExternalAxis = 5,
    /// 设置工具坐标系（TCP）
    SetTool = 6,
    /// 设置工件坐标系
    SetWorkObject = 7,
    /// 设置速度
    SetSpeed = 8,
    /// 设置转弯区
    SetZone = 9,
    /// 远端缓冲追加一个位姿
    BufferAdd = 30,
    /// 清空远端缓冲
    ClearBuffer = 31,
    /// 查询远端缓冲长度
    BufferLen = 32,
    /// 顺序执行远端缓冲内全部移动
    BufferExecute = 33,
    /// 设置外部轴（原始单位）
    SetExternalAxis = 34,
    /// 圆弧运动第一阶段（经过点）
    CircularVia = 35,
    /// 圆弧运动第二阶段（终点），仅在第一阶段成功后发送
    CircularEnd = 36,
    /// 设置数字 IO 线
    SetDio = 97,
    /// 查询机器人信息（标识符列表，非数字载荷）
    GetRobotInfo = 98,
    /// 会话关闭（不等待应答）
    Close = 99,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", u8::from(*self))
    }
}

impl FromStr for Opcode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code: u8 = s
            .parse()
            .map_err(|_| ProtocolError::UnknownOpcode { code: 0 })?;
        Opcode::try_from(code).map_err(|_| ProtocolError::UnknownOpcode { code })
    }
}

// ==================== 位姿 ====================

/// 位姿：位置（毫米）+ 单位四元数姿态
///
/// 规范形状为嵌套 `[[x,y,z],[q1,q2,q3,q4]]`；平铺 7 值序列是等价的
/// 输入形状，经 [`TryFrom`] 归一化到同一规范值（归一化幂等）。
/// 其余形状一律 [`ProtocolError::MalformedPose`]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: [f64; 3],
    pub orientation: [f64; 4],
}

impl Pose {
    /// 恒等位姿：原点 + 单位四元数
    pub const IDENTITY: Pose = Pose {
        position: [0.0, 0.0, 0.0],
        orientation: [1.0, 0.0, 0.0, 0.0],
    };

    pub fn new(position: [f64; 3], orientation: [f64; 4]) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TryFrom<&[f64]> for Pose {
    type Error = ProtocolError;

    /// 平铺 7 值形状 `[x, y, z, q1, q2, q3, q4]`
    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        if values.len() != 7 {
            return Err(ProtocolError::MalformedPose {
                got: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            position: [values[0], values[1], values[2]],
            orientation: [values[3], values[4], values[5], values[6]],
        })
    }
}

impl TryFrom<Vec<f64>> for Pose {
    type Error = ProtocolError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Pose::try_from(values.as_slice())
    }
}

impl From<([f64; 3], [f64; 4])> for Pose {
    fn from((position, orientation): ([f64; 3], [f64; 4])) -> Self {
        Self::new(position, orientation)
    }
}

#[cfg(feature = "serde")]
mod pose_serde {
    //! 文档形状支持：嵌套与平铺两种等价输入，序列化固定输出嵌套形状。

    use super::Pose;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PoseRepr {
        Nested([f64; 3], [f64; 4]),
        Flat([f64; 7]),
    }

    impl<'de> Deserialize<'de> for Pose {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            match PoseRepr::deserialize(deserializer) {
                Ok(PoseRepr::Nested(position, orientation)) => {
                    Ok(Pose::new(position, orientation))
                }
                Ok(PoseRepr::Flat(v)) => Ok(Pose::new([v[0], v[1], v[2]], [v[3], v[4], v[5], v[6]])),
                Err(_) => Err(D::Error::custom(
                    "malformed pose: expected [[x,y,z],[q1..q4]] or a flat 7-value sequence",
                )),
            }
        }
    }

    impl Serialize for Pose {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            (self.position, self.orientation).serialize(serializer)
        }
    }
}

// ==================== 关节角 ====================

/// 六轴关节角，内部单位为弧度，线上单位由 [`UnitSystem`] 决定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointAngles(pub [f64; 6]);

impl JointAngles {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<&[f64]> for JointAngles {
    type Error = ProtocolError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let arr: [f64; 6] =
            values
                .try_into()
                .map_err(|_| ProtocolError::InvalidParameterCount {
                    expected: 6,
                    actual: values.len(),
                })?;
        Ok(Self(arr))
    }
}

impl From<[f64; 6]> for JointAngles {
    fn from(values: [f64; 6]) -> Self {
        Self(values)
    }
}

// ==================== 速度 ====================

/// 速度设定：TCP 线速度 (mm/s)、TCP 角速度 (deg/s)、外部轴线速度、外部轴角速度
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Speed {
    pub tcp_linear: f64,
    pub tcp_angular: f64,
    pub ext_linear: f64,
    pub ext_angular: f64,
}

impl Default for Speed {
    fn default() -> Self {
        Self {
            tcp_linear: 100.0,
            tcp_angular: 50.0,
            ext_linear: 50.0,
            ext_angular: 50.0,
        }
    }
}

impl TryFrom<&[f64]> for Speed {
    type Error = ProtocolError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        if values.len() != 4 {
            return Err(ProtocolError::InvalidParameterCount {
                expected: 4,
                actual: values.len(),
            });
        }
        Ok(Self {
            tcp_linear: values[0],
            tcp_angular: values[1],
            ext_linear: values[2],
            ext_angular: values[3],
        })
    }
}

// ==================== 转弯区 ====================

/// 转弯区预设表（RAPID 手册 `z*` 值）：`(键, [pzone_tcp, pzone_ori, zone_ori])`
pub const ZONE_PRESETS: [(&str, [f64; 3]); 10] = [
    ("z0", [0.3, 0.3, 0.03]),
    ("z1", [1.0, 1.0, 0.1]),
    ("z5", [5.0, 8.0, 0.8]),
    ("z10", [10.0, 15.0, 1.5]),
    ("z15", [15.0, 23.0, 2.3]),
    ("z20", [20.0, 30.0, 3.0]),
    ("z30", [30.0, 45.0, 4.5]),
    ("z50", [50.0, 75.0, 7.5]),
    ("z100", [100.0, 150.0, 15.0]),
    ("z200", [200.0, 300.0, 30.0]),
];

/// 转弯区设定
///
/// 经过多点路径时允许偏离路径点的飞越半径：
/// - `pzone_tcp`: TCP 位置不受刚性约束的半径 (mm)
/// - `pzone_ori`: 工具姿态不受刚性约束的半径 (mm)
/// - `zone_ori`: 工具重定向的转弯区大小 (deg)
///
/// `point_motion = true` 表示精确到点（短暂停顿后再继续），强制全零三元组。
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Zone {
    pub point_motion: bool,
    pub pzone_tcp: f64,
    pub pzone_ori: f64,
    pub zone_ori: f64,
}

impl Zone {
    /// 按预设键查表
    pub fn preset(key: &str) -> Option<Zone> {
        ZONE_PRESETS
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, triple)| Zone::from_triple(false, *triple))
    }

    fn from_triple(point_motion: bool, triple: [f64; 3]) -> Zone {
        Zone {
            point_motion,
            pzone_tcp: triple[0],
            pzone_ori: triple[1],
            zone_ori: triple[2],
        }
    }

    /// 解析转弯区输入，优先级：点动 > 手动三元组 > 预设键
    ///
    /// 均不匹配时本地失败，不产生任何 I/O。
    pub fn resolve(
        key: &str,
        point_motion: bool,
        manual: Option<[f64; 3]>,
    ) -> Result<Zone, ProtocolError> {
        if point_motion {
            return Ok(Zone::from_triple(true, [0.0, 0.0, 0.0]));
        }
        if let Some(triple) = manual {
            return Ok(Zone::from_triple(false, triple));
        }
        Zone::preset(key).ok_or_else(|| ProtocolError::UnknownZone {
            key: key.to_string(),
        })
    }
}

impl Default for Zone {
    /// 默认 `z1`
    fn default() -> Self {
        Zone::from_triple(false, [1.0, 1.0, 0.1])
    }
}

// ==================== 单位制 ====================

/// 线性单位（内部统一换算为线上毫米）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinearUnit {
    #[default]
    Millimeters,
    Meters,
    Inches,
}

impl LinearUnit {
    pub fn scale(self) -> f64 {
        match self {
            LinearUnit::Millimeters => 1.0,
            LinearUnit::Meters => 1000.0,
            LinearUnit::Inches => 25.4,
        }
    }
}

/// 角度单位（内部统一换算为线上度）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AngularUnit {
    #[default]
    Degrees,
    Radians,
}

impl AngularUnit {
    pub fn scale(self) -> f64 {
        match self {
            AngularUnit::Degrees => 1.0,
            AngularUnit::Radians => 57.2957795,
        }
    }
}

/// 单位制：对每个出线/入线的线性与角度字段统一施加的换算系数
///
/// 每个客户端实例一份，配置时固定。出线乘以系数，入线除以系数；
/// 四元数与外部轴字段不换算。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSystem {
    pub scale_linear: f64,
    pub scale_angle: f64,
}

impl UnitSystem {
    pub fn new(linear: LinearUnit, angular: AngularUnit) -> Self {
        Self {
            scale_linear: linear.scale(),
            scale_angle: angular.scale(),
        }
    }

    pub fn to_wire_linear(&self, value: f64) -> f64 {
        value * self.scale_linear
    }

    pub fn from_wire_linear(&self, value: f64) -> f64 {
        value / self.scale_linear
    }

    pub fn to_wire_angle(&self, value: f64) -> f64 {
        value * self.scale_angle
    }

    pub fn from_wire_angle(&self, value: f64) -> f64 {
        value / self.scale_angle
    }
}

impl Default for UnitSystem {
    /// 毫米 + 度（换算系数均为 1）
    fn default() -> Self {
        Self::new(LinearUnit::Millimeters, AngularUnit::Degrees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_display_two_digits() {
        assert_eq!(Opcode::MoveTcp.to_string(), "01");
        assert_eq!(Opcode::SetZone.to_string(), "09");
        assert_eq!(Opcode::BufferAdd.to_string(), "30");
        assert_eq!(Opcode::Close.to_string(), "99");
    }

    #[test]
    fn test_opcode_from_str() {
        assert_eq!("01".parse::<Opcode>().unwrap(), Opcode::MoveTcp);
        assert_eq!("98".parse::<Opcode>().unwrap(), Opcode::GetRobotInfo);
        assert!(matches!(
            "77".parse::<Opcode>(),
            Err(ProtocolError::UnknownOpcode { code: 77 })
        ));
        assert!("xx".parse::<Opcode>().is_err());
    }

    #[test]
    fn test_pose_flat_normalizes_to_nested() {
        let flat = [100.0, 200.0, 300.0, 1.0, 0.0, 0.0, 0.0];
        let pose = Pose::try_from(flat.as_slice()).unwrap();
        assert_eq!(pose, Pose::new([100.0, 200.0, 300.0], [1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn test_pose_wrong_arity_is_malformed() {
        for len in [0usize, 3, 6, 8] {
            let values = vec![0.0; len];
            assert!(matches!(
                Pose::try_from(values.as_slice()),
                Err(ProtocolError::MalformedPose { .. })
            ));
        }
    }

    #[test]
    fn test_joint_angles_arity() {
        let six = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        assert!(JointAngles::try_from(six.as_slice()).is_ok());

        let five = [0.1, 0.2, 0.3, 0.4, 0.5];
        assert!(matches!(
            JointAngles::try_from(five.as_slice()),
            Err(ProtocolError::InvalidParameterCount {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_speed_default_matches_controller_defaults() {
        let speed = Speed::default();
        assert_eq!(speed.tcp_linear, 100.0);
        assert_eq!(speed.tcp_angular, 50.0);
        assert_eq!(speed.ext_linear, 50.0);
        assert_eq!(speed.ext_angular, 50.0);
    }

    #[test]
    fn test_zone_preset_z1() {
        let zone = Zone::preset("z1").unwrap();
        assert_eq!(zone.pzone_tcp, 1.0);
        assert_eq!(zone.pzone_ori, 1.0);
        assert_eq!(zone.zone_ori, 0.1);
        assert!(!zone.point_motion);
    }

    #[test]
    fn test_zone_point_motion_forces_zero_triple() {
        let zone = Zone::resolve("z100", true, Some([5.0, 5.0, 5.0])).unwrap();
        assert!(zone.point_motion);
        assert_eq!(
            (zone.pzone_tcp, zone.pzone_ori, zone.zone_ori),
            (0.0, 0.0, 0.0)
        );
    }

    #[test]
    fn test_zone_manual_overrides_preset() {
        let zone = Zone::resolve("z1", false, Some([2.0, 3.0, 4.0])).unwrap();
        assert_eq!(
            (zone.pzone_tcp, zone.pzone_ori, zone.zone_ori),
            (2.0, 3.0, 4.0)
        );
    }

    #[test]
    fn test_zone_unknown_key_fails_locally() {
        assert!(matches!(
            Zone::resolve("z42", false, None),
            Err(ProtocolError::UnknownZone { .. })
        ));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_pose_document_shapes() {
        let nested: Pose = serde_json::from_str("[[1.0, 2.0, 3.0], [1.0, 0.0, 0.0, 0.0]]").unwrap();
        let flat: Pose = serde_json::from_str("[1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]").unwrap();
        assert_eq!(nested, flat);

        // 序列化固定输出嵌套形状
        let json = serde_json::to_value(nested).unwrap();
        assert_eq!(
            json,
            serde_json::json!([[1.0, 2.0, 3.0], [1.0, 0.0, 0.0, 0.0]])
        );

        // 其余形状一律拒绝
        assert!(serde_json::from_str::<Pose>("[[1.0, 2.0], [1.0, 0.0, 0.0, 0.0]]").is_err());
        assert!(serde_json::from_str::<Pose>("[1.0, 2.0, 3.0]").is_err());
    }

    #[test]
    fn test_unit_scales() {
        assert_eq!(LinearUnit::Meters.scale(), 1000.0);
        assert_eq!(LinearUnit::Inches.scale(), 25.4);
        assert_eq!(AngularUnit::Radians.scale(), 57.2957795);

        let units = UnitSystem::new(LinearUnit::Meters, AngularUnit::Radians);
        assert_eq!(units.to_wire_linear(1.5), 1500.0);
        assert!((units.from_wire_angle(units.to_wire_angle(0.5)) - 0.5).abs() < 1e-12);
    }
}
