//! # Rapidlink Mock
//!
//! 控制器侧协议桩：监听运动端口、接受一条连接、循环读取以 `#`
//! 终止的帧。协议错误（空帧、缺终止符）与未注册操作码一律回
//! 单字节错误应答 [`ERR_BYTE`]，处理成功回单字节确认 [`ACK_BYTE`]，
//! 从不返回结构化载荷，也从不因坏帧退出。
//!
//! 这是供集成测试用的协议桩，不模拟机器人物理行为。一次只服务
//! 一条连接（阻塞循环），是有意的简化；如需并发测试客户端，
//! 应扩展为每条连接一个处理任务、各自独立的解析状态。

use rapidlink_protocol::{Opcode, TERMINATOR};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use thiserror::Error;
use tracing::{error, info};

/// 确认应答字节
pub const ACK_BYTE: u8 = b'#';
/// 错误应答字节
pub const ERR_BYTE: u8 = b'!';

/// 监听端口的环境变量覆盖
pub const PORT_ENV: &str = "PORT";

const READ_CHUNK: usize = 4096;

/// 协议桩错误类型
#[derive(Error, Debug)]
pub enum MockError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 空帧
    #[error("Invalid instruction: empty frame")]
    EmptyFrame,

    /// 帧缺少 `#` 终止符
    #[error("Invalid instruction: frame missing terminator")]
    UnterminatedFrame,

    /// 操作码未注册处理器
    #[error("Unknown opcode: {code:?}")]
    UnknownOpcode { code: String },
}

/// 控制器协议桩
pub struct MockServer {
    listener: TcpListener,
}

impl MockServer {
    /// 绑定监听端点
    ///
    /// [`PORT_ENV`] 环境变量优先于入参；传 0 取临时端口（测试用）。
    pub fn bind(port: u16) -> Result<MockServer, MockError> {
        let port = std::env::var(PORT_ENV)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(port);
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!(port = listener.local_addr()?.port(), "mock server listening");
        Ok(MockServer { listener })
    }

    /// 实际监听地址（临时端口绑定后由此取回）
    pub fn local_addr(&self) -> Result<SocketAddr, MockError> {
        Ok(self.listener.local_addr()?)
    }

    /// 接受一条连接并循环处理帧，直到对端断开
    pub fn serve(&self) -> Result<(), MockError> {
        let (stream, addr) = self.listener.accept()?;
        info!(%addr, "accepted connection");
        self.serve_connection(stream)
    }

    fn serve_connection(&self, mut stream: TcpStream) -> Result<(), MockError> {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let n = stream.read(&mut buf)?;
            if n == 0 {
                info!("client disconnected");
                return Ok(());
            }
            let message = String::from_utf8_lossy(&buf[..n]).into_owned();
            let reply = match handle_frame(&message) {
                Ok(()) => ACK_BYTE,
                Err(err) => {
                    error!(%err, frame = %message, "rejecting frame");
                    ERR_BYTE
                }
            };
            stream.write_all(&[reply])?;
        }
    }
}

/// 解析一帧：校验终止符，切出操作码与参数 token
pub fn parse_frame(message: &str) -> Result<(Opcode, Vec<&str>), MockError> {
    if message.is_empty() {
        return Err(MockError::EmptyFrame);
    }
    let Some(body) = message.strip_suffix(TERMINATOR as char) else {
        return Err(MockError::UnterminatedFrame);
    };

    let mut tokens = body.split_whitespace();
    let code = tokens.next().ok_or(MockError::EmptyFrame)?;
    let opcode = code.parse::<Opcode>().map_err(|_| MockError::UnknownOpcode {
        code: code.to_string(),
    })?;
    Ok((opcode, tokens.collect()))
}

/// 解析并分发一帧到处理器
pub fn handle_frame(message: &str) -> Result<(), MockError> {
    let (opcode, parameters) = parse_frame(message)?;
    let handler = dispatch(opcode).ok_or_else(|| MockError::UnknownOpcode {
        code: opcode.to_string(),
    })?;
    handler(&parameters);
    Ok(())
}

type Handler = fn(&[&str]);

/// 分发表：注册的操作码子集
fn dispatch(opcode: Opcode) -> Option<Handler> {
    match opcode {
        Opcode::MoveTcp => Some(handlers::move_tcp),
        Opcode::SetJoints => Some(handlers::set_joints),
        Opcode::GetJoints => Some(handlers::get_joints),
        Opcode::SetTool => Some(handlers::set_tool),
        Opcode::SetWorkObject => Some(handlers::set_workobject),
        Opcode::SetSpeed => Some(handlers::set_speed),
        Opcode::SetZone => Some(handlers::set_zone),
        _ => None,
    }
}

mod handlers {
    //! 操作处理器：记录解码后的参数，不模拟任何机器人行为

    use tracing::info;

    pub fn move_tcp(parameters: &[&str]) {
        info!(?parameters, "move_tcp");
    }

    pub fn set_joints(parameters: &[&str]) {
        info!(?parameters, "set_joints");
    }

    pub fn get_joints(parameters: &[&str]) {
        let _ = parameters;
        info!("get_joints");
    }

    pub fn set_tool(parameters: &[&str]) {
        info!(?parameters, "set_tool");
    }

    pub fn set_workobject(parameters: &[&str]) {
        info!(?parameters, "set_workobject");
    }

    pub fn set_speed(parameters: &[&str]) {
        info!(?parameters, "set_speed");
    }

    pub fn set_zone(parameters: &[&str]) {
        info!(?parameters, "set_zone");
    }
}
