//! 客户端配置
//!
//! 默认工具/工件坐标系、速度、转弯区等全部是实例级配置值，
//! 不存在跨实例共享的可变默认值。支持从 TOML 文件加载，
//! 工具坐标系另可从外部 JSON 文档读入（嵌套或平铺位姿形状均接受）。

use rapidlink_protocol::{AngularUnit, LinearUnit, Pose, Speed, UnitSystem, Zone};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// 配置加载错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to parse tool document: {0}")]
    Json(#[from] serde_json::Error),
}

/// 运动客户端配置
///
/// 所有字段都有与控制器出厂约定一致的默认值，TOML 中省略的字段
/// 取默认（`#[serde(default)]`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// 控制器地址
    pub address: String,
    /// 运动端口
    pub motion_port: u16,
    /// 遥测流端口
    pub telemetry_port: u16,
    /// 线性单位（决定线上换算系数，实例存续期内固定）
    pub linear_unit: LinearUnit,
    /// 角度单位
    pub angular_unit: AngularUnit,
    /// 默认工具坐标系
    pub tool: Pose,
    /// 默认工件坐标系
    pub workobject: Pose,
    /// 默认速度
    pub speed: Speed,
    /// 默认转弯区
    pub zone: Zone,
    /// 帧间延迟（毫秒），控制器处理时延
    pub message_delay_ms: u64,
    /// 建连超时（毫秒），仅作用于建连阶段
    pub connect_timeout_ms: u64,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            address: "192.168.125.1".to_string(),
            motion_port: 5000,
            telemetry_port: 5001,
            linear_unit: LinearUnit::Millimeters,
            angular_unit: AngularUnit::Degrees,
            tool: Pose::IDENTITY,
            workobject: Pose::IDENTITY,
            speed: Speed::default(),
            zone: Zone::default(),
            message_delay_ms: 80,
            connect_timeout_ms: 2500,
        }
    }
}

impl RobotConfig {
    /// 从 TOML 文件加载配置
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// 运动端点地址（`host:port`）
    pub fn motion_endpoint(&self) -> String {
        format!("{}:{}", self.address, self.motion_port)
    }

    /// 遥测端点地址
    pub fn telemetry_endpoint(&self) -> String {
        format!("{}:{}", self.address, self.telemetry_port)
    }

    /// 由配置的单位构建单位制
    pub fn units(&self) -> UnitSystem {
        UnitSystem::new(self.linear_unit, self.angular_unit)
    }

    pub fn message_delay(&self) -> Duration {
        Duration::from_millis(self.message_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// 从外部 JSON 文档读取工具坐标系
///
/// 文档形状与协议位姿一致：嵌套 `[[x,y,z],[q1..q4]]` 或平铺 7 值，
/// 其余形状报错。
pub fn load_tool_document(path: impl AsRef<Path>) -> Result<Pose, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_default_config_matches_controller_defaults() {
        let config = RobotConfig::default();
        assert_eq!(config.motion_endpoint(), "192.168.125.1:5000");
        assert_eq!(config.telemetry_endpoint(), "192.168.125.1:5001");
        assert_eq!(config.tool, Pose::IDENTITY);
        assert_eq!(config.units(), UnitSystem::default());
        assert_eq!(config.message_delay(), Duration::from_millis(80));
        assert_eq!(config.connect_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            address = "10.0.0.7"
            angular_unit = "radians"
            message_delay_ms = 10
            "#
        )
        .unwrap();

        let config = RobotConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.address, "10.0.0.7");
        assert_eq!(config.angular_unit, AngularUnit::Radians);
        assert_eq!(config.message_delay_ms, 10);
        // 未给出的字段取默认
        assert_eq!(config.motion_port, 5000);
        assert_eq!(config.speed, Speed::default());
    }

    #[test]
    fn test_tool_document_both_shapes() {
        let mut nested = tempfile::NamedTempFile::new().unwrap();
        write!(nested, "[[1.0, 2.0, 3.0], [1.0, 0.0, 0.0, 0.0]]").unwrap();
        let mut flat = tempfile::NamedTempFile::new().unwrap();
        write!(flat, "[1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]").unwrap();

        let a = load_tool_document(nested.path()).unwrap();
        let b = load_tool_document(flat.path()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tool_document_malformed_shape() {
        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "[1.0, 2.0, 3.0]").unwrap();
        assert!(matches!(
            load_tool_document(bad.path()),
            Err(ConfigError::Json(_))
        ));
    }
}
