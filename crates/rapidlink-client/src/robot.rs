//! 运动客户端
//!
//! 持有到控制器运动端口的唯一活动连接。每次调用都是同步请求/应答：
//! 编码、写出、等待固定帧间延迟（控制器处理时延）、阻塞读取一次
//! 应答（挂起点，上限 [`MAX_RESPONSE_LEN`] 字节）。
//!
//! 会话状态机：`Disconnected → Connected → Configured → Closed`（终态）。
//! 关闭之后的任何操作都失败。

use crate::config::RobotConfig;
use crate::error::ClientError;
use rapidlink_protocol::{
    codec, JointAngles, Opcode, Pose, Speed, UnitSystem, Zone, MAX_RESPONSE_LEN, STATUS_OK,
};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info, warn};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 未建连（仅存在于构造过程中）
    Disconnected,
    /// 已建连，默认配置尚未下发
    Connected,
    /// 默认单位制/工具/工件/速度/转弯区已下发，可正常使用
    Configured,
    /// 已关闭（终态）
    Closed,
}

/// 机器人运动客户端
///
/// 一次会话构造一个实例。请求路径严格一次一请求；并发调用方必须
/// 在外部串行化（单写者假设）。
pub struct Robot {
    stream: TcpStream,
    peer: SocketAddr,
    units: UnitSystem,
    delay: Duration,
    tool: Pose,
    state: SessionState,
}

impl Robot {
    /// 按配置建连并下发默认配置
    ///
    /// 建连阶段施加有界超时（[`ClientError::ConnectTimeout`]），
    /// 成功后切换为无界阻塞 I/O。返回时会话处于 `Configured` 态：
    /// 单位制、工具、工件坐标系、速度、转弯区均已生效。
    pub fn connect(config: &RobotConfig) -> Result<Robot, ClientError> {
        let endpoint = config.motion_endpoint();
        let addr = endpoint
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("no address for {endpoint}"),
            ))?;

        let timeout = config.connect_timeout();
        info!(%addr, "connecting to motion endpoint");
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|err| {
            if err.kind() == std::io::ErrorKind::TimedOut
                || err.kind() == std::io::ErrorKind::WouldBlock
            {
                ClientError::ConnectTimeout { addr, timeout }
            } else {
                ClientError::ConnectionLost(err)
            }
        })?;
        // 稳态使用无界阻塞读写
        stream.set_read_timeout(None)?;
        stream.set_write_timeout(None)?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected to motion endpoint");

        let mut robot = Robot {
            stream,
            peer: addr,
            units: config.units(),
            delay: config.message_delay(),
            tool: Pose::IDENTITY,
            state: SessionState::Connected,
        };

        robot.set_tool(&config.tool)?;
        robot.set_workobject(&config.workobject)?;
        robot.send_speed(&config.speed)?;
        robot.send_zone(&config.zone)?;
        robot.state = SessionState::Configured;
        Ok(robot)
    }

    /// 当前会话状态
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// 对端地址
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// 活动单位制（配置时固定）
    pub fn units(&self) -> UnitSystem {
        self.units
    }

    // ==================== 运动与坐标系 ====================

    /// 从当前位姿立即直线移动到目标位姿
    pub fn set_cartesian(&mut self, pose: &Pose) -> Result<(), ClientError> {
        self.pose_op("set_cartesian", Opcode::MoveTcp, pose)
    }

    /// 从当前关节角立即移动到目标关节角
    ///
    /// 长度不为 6 时本地失败，不产生任何 I/O。
    pub fn set_joints(&mut self, joints: &[f64]) -> Result<(), ClientError> {
        let joints = JointAngles::try_from(joints)?;
        let msg = codec::encode_set_joints(&self.units, &joints);
        self.request("set_joints", &msg)?;
        Ok(())
    }

    /// 设置工具坐标系（TCP），并刷新本地缓存
    pub fn set_tool(&mut self, tool: &Pose) -> Result<(), ClientError> {
        self.pose_op("set_tool", Opcode::SetTool, tool)?;
        self.tool = *tool;
        Ok(())
    }

    /// 本地缓存的工具坐标系（`set_tool` 时刷新）
    pub fn get_tool(&self) -> Pose {
        self.tool
    }

    /// 从外部 JSON 文档加载工具坐标系并下发
    pub fn load_tool_file(&mut self, path: impl AsRef<std::path::Path>) -> Result<(), ClientError> {
        let tool = crate::config::load_tool_document(path)?;
        self.set_tool(&tool)
    }

    /// 设置工件坐标系（后续笛卡尔移动在该坐标系内表达）
    pub fn set_workobject(&mut self, workobject: &Pose) -> Result<(), ClientError> {
        self.pose_op("set_workobject", Opcode::SetWorkObject, workobject)
    }

    // ==================== 查询 ====================

    /// 查询当前位姿，线性字段按单位制反换算
    pub fn get_cartesian(&mut self) -> Result<Pose, ClientError> {
        let raw = self.request("get_cartesian", &codec::encode_query(Opcode::GetCartesian))?;
        Ok(codec::decode_cartesian(&self.units, &raw)?)
    }

    /// 查询当前关节角，按单位制反换算
    pub fn get_joints(&mut self) -> Result<JointAngles, ClientError> {
        let raw = self.request("get_joints", &codec::encode_query(Opcode::GetJoints))?;
        Ok(codec::decode_joints(&self.units, &raw)?)
    }

    /// 查询外部轴，原始值，不换算
    pub fn get_external_axis(&mut self) -> Result<[f64; 6], ClientError> {
        let raw = self.request(
            "get_external_axis",
            &codec::encode_query(Opcode::GetExternalAxis),
        )?;
        Ok(codec::decode_external_axis(&raw)?)
    }

    /// 查询机器人信息（型号、软件版本等标识符列表）
    pub fn get_robotinfo(&mut self) -> Result<Vec<String>, ClientError> {
        let raw = self.request("get_robotinfo", &codec::encode_query(Opcode::GetRobotInfo))?;
        let info = codec::decode_robotinfo(&raw)?;
        debug!(?info, "get_robotinfo result");
        Ok(info)
    }

    // ==================== 速度与转弯区 ====================

    /// 设置速度四元组，长度不为 4 时本地失败
    pub fn set_speed(&mut self, speed: &[f64]) -> Result<(), ClientError> {
        let speed = Speed::try_from(speed)?;
        self.send_speed(&speed)
    }

    fn send_speed(&mut self, speed: &Speed) -> Result<(), ClientError> {
        let msg = codec::encode_set_speed(speed);
        self.request("set_speed", &msg)?;
        Ok(())
    }

    /// 设置转弯区：预设键、手动三元组或点动捷径
    ///
    /// 解析优先级见 [`Zone::resolve`]；均不匹配时本地失败，不触网。
    pub fn set_zone(
        &mut self,
        zone_key: &str,
        point_motion: bool,
        manual_zone: Option<[f64; 3]>,
    ) -> Result<(), ClientError> {
        let zone = Zone::resolve(zone_key, point_motion, manual_zone)?;
        self.send_zone(&zone)
    }

    fn send_zone(&mut self, zone: &Zone) -> Result<(), ClientError> {
        let msg = codec::encode_set_zone(zone);
        self.request("set_zone", &msg)?;
        Ok(())
    }

    // ==================== 远端缓冲 ====================

    /// 向远端缓冲追加一个位姿（按追加时的当前速度执行）
    pub fn buffer_add(&mut self, pose: &Pose) -> Result<(), ClientError> {
        self.pose_op("buffer_add", Opcode::BufferAdd, pose)
    }

    /// 清空远端缓冲后按序发送每个位姿，再校验远端长度
    ///
    /// 长度不符说明传输丢失：先发出纠正性清空，再返回
    /// [`ClientError::BufferConsistency`]（当前调用级错误，会话可继续）。
    pub fn buffer_set(&mut self, poses: &[Pose]) -> Result<(), ClientError> {
        self.clear_buffer()?;
        for pose in poses {
            self.buffer_add(pose)?;
        }
        let observed = self.buffer_len()?;
        if observed != poses.len() {
            warn!(
                expected = poses.len(),
                observed, "remote buffer length mismatch, issuing corrective clear"
            );
            let _ = self.clear_buffer();
            return Err(ClientError::BufferConsistency {
                expected: poses.len(),
                observed,
            });
        }
        debug!(count = poses.len(), "remote buffer populated");
        Ok(())
    }

    /// 清空远端缓冲并校验后置条件
    ///
    /// 清空后长度仍非零同样以 [`ClientError::BufferConsistency`] 报告
    /// （与 `buffer_set` 统一的可恢复错误级别）。
    pub fn clear_buffer(&mut self) -> Result<(), ClientError> {
        self.request("clear_buffer", &codec::encode_query(Opcode::ClearBuffer))?;
        let observed = self.buffer_len()?;
        if observed != 0 {
            warn!(observed, "clear_buffer left non-empty remote buffer");
            return Err(ClientError::BufferConsistency {
                expected: 0,
                observed,
            });
        }
        Ok(())
    }

    /// 查询远端缓冲长度（已存位姿数）
    pub fn buffer_len(&mut self) -> Result<usize, ClientError> {
        let raw = self.request("buffer_len", &codec::encode_query(Opcode::BufferLen))?;
        Ok(codec::decode_buffer_len(&raw)?)
    }

    /// 按插入顺序对远端缓冲内全部位姿立即执行直线移动
    pub fn buffer_execute(&mut self) -> Result<(), ClientError> {
        self.request(
            "buffer_execute",
            &codec::encode_query(Opcode::BufferExecute),
        )?;
        Ok(())
    }

    // ==================== 其他操作 ====================

    /// 设置外部轴，原始单位，长度不为 6 时本地失败
    pub fn set_external_axis(&mut self, axes: &[f64]) -> Result<(), ClientError> {
        let axes: [f64; 6] =
            axes.try_into()
                .map_err(|_| rapidlink_protocol::ProtocolError::InvalidParameterCount {
                    expected: 6,
                    actual: axes.len(),
                })?;
        let msg = codec::encode_set_external_axis(&axes);
        self.request("set_external_axis", &msg)?;
        Ok(())
    }

    /// 圆弧运动：从当前位置经 `via` 到 `end` 的两阶段握手
    ///
    /// 仅当第一阶段（经过点）状态为成功时才发送第二阶段；
    /// 否则在第一阶段后中止，线上只出现一条消息。
    pub fn move_circular(&mut self, via: &Pose, end: &Pose) -> Result<(), ClientError> {
        let via_msg = codec::encode_pose_op(Opcode::CircularVia, &self.units, via);
        let raw = self.request("move_circular", &via_msg)?;
        let status = codec::decode_status(&raw)?;
        if status != STATUS_OK {
            warn!(status, "circular via-point rejected, aborting before end-point");
            return Err(ClientError::ViaPointRejected { status });
        }
        let end_msg = codec::encode_pose_op(Opcode::CircularEnd, &self.units, end);
        self.request("move_circular", &end_msg)?;
        Ok(())
    }

    /// 设置数字 IO 线，布尔压成 0/1
    ///
    /// `line` 仅做接口预留：控制器侧 97 指令文法只接受单值，线号
    /// 不上线（需控制器侧确认后才会扩展线上格式）。
    pub fn set_dio(&mut self, value: bool, line: u8) -> Result<(), ClientError> {
        let _ = line;
        let msg = codec::encode_set_dio(value);
        self.request("set_dio", &msg)?;
        Ok(())
    }

    /// 关闭会话：通知控制器（不等待应答）并释放连接
    ///
    /// 至多一次；二次关闭与关闭后的任何操作均返回
    /// [`ClientError::SessionClosed`]。
    pub fn close(&mut self) -> Result<(), ClientError> {
        self.ensure_open()?;
        let msg = codec::encode_query(Opcode::Close);
        debug!(operation = "close", frame = %msg, "sending");
        let write_result = self.stream.write_all(msg.as_bytes());
        let _ = self.stream.shutdown(Shutdown::Both);
        self.state = SessionState::Closed;
        write_result?;
        info!(peer = %self.peer, "disconnected from motion endpoint");
        Ok(())
    }

    // ==================== 请求路径 ====================

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.state == SessionState::Closed {
            return Err(ClientError::SessionClosed);
        }
        Ok(())
    }

    fn pose_op(
        &mut self,
        operation: &'static str,
        opcode: Opcode,
        pose: &Pose,
    ) -> Result<(), ClientError> {
        let msg = codec::encode_pose_op(opcode, &self.units, pose);
        self.request(operation, &msg)?;
        Ok(())
    }

    /// 同步请求/应答：写出、等待帧间延迟、阻塞读一次应答
    fn request(&mut self, operation: &'static str, msg: &str) -> Result<String, ClientError> {
        self.ensure_open()?;
        debug!(operation, frame = %msg, "sending");
        self.stream.write_all(msg.as_bytes())?;
        spin_sleep::sleep(self.delay);

        let mut buf = vec![0u8; MAX_RESPONSE_LEN];
        let n = self.stream.read(&mut buf)?;
        if n == 0 {
            self.state = SessionState::Closed;
            return Err(ClientError::ConnectionLost(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "controller closed the motion connection",
            )));
        }
        let raw = String::from_utf8_lossy(&buf[..n]).into_owned();
        debug!(operation, response = %raw, "received");
        Ok(raw)
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            let _ = self.close();
        }
    }
}
