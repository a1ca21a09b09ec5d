//! 遥测监听
//!
//! 独立于运动客户端的第二条连接：专用阻塞读循环解析空白分隔的数字
//! 样本，按首部判别字段分发到位姿/关节两个有界历史环。环支持单写者
//! （监听线程）多读者（任意调用方）并发访问，溢出时淘汰最旧样本。
//!
//! 没有协作式取消：停止监听的唯一方式是关闭连接，读错误随即结束
//! 循环并释放连接；不做自动重连，终止错误上抛给持有者。

use arc_swap::ArcSwapOption;
use crossbeam_channel::{bounded, Receiver};
use parking_lot::RwLock;
use rapidlink_protocol::{JointAngles, Pose};
use std::collections::VecDeque;
use std::io::Read;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

/// 遥测层错误类型
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// 读循环因 I/O 失败终止（含对端关闭）
    #[error("Telemetry connection lost: {0}")]
    Io(#[from] std::io::Error),

    /// 样本文本无法解析
    #[error("Malformed telemetry sample: {reason} (raw: {raw:?})")]
    MalformedSample { reason: String, raw: String },
}

/// 位姿样本流的判别值
const STREAM_POSE: i64 = 0;
/// 关节样本流的判别值
const STREAM_JOINTS: i64 = 1;

const READ_CHUNK: usize = 4096;

// ==================== 有界历史环 ====================

/// 有界历史环：单写者多读者，溢出淘汰最旧样本
///
/// 读锁保护的环形队列，绝不是无保护的可增长列表。容量固定，
/// `last(n)` 按到达顺序返回最近 n 个样本。
pub struct HistoryRing<T> {
    buf: RwLock<VecDeque<T>>,
    capacity: usize,
}

impl<T: Clone> HistoryRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// 追加一个样本，满时先淘汰最旧的
    ///
    /// 容量 0 表示不保留任何历史，样本直接丢弃。
    pub fn push(&self, item: T) {
        if self.capacity == 0 {
            return;
        }
        let mut buf = self.buf.write();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(item);
    }

    /// 最近一个样本
    pub fn latest(&self) -> Option<T> {
        self.buf.read().back().cloned()
    }

    /// 按到达顺序返回最近 n 个样本
    pub fn last(&self, n: usize) -> Vec<T> {
        let buf = self.buf.read();
        let skip = buf.len().saturating_sub(n);
        buf.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buf.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ==================== 监听器 ====================

/// 遥测监听器句柄
///
/// `connect` 即启动专用读线程；句柄暴露历史环与运行标志，
/// `join` 回收线程并上抛终止错误。
pub struct Telemetry {
    poses: Arc<HistoryRing<Pose>>,
    joints: Arc<HistoryRing<JointAngles>>,
    latest_pose: Arc<ArcSwapOption<Pose>>,
    running: Arc<AtomicBool>,
    stream: TcpStream,
    thread: Option<JoinHandle<()>>,
    error_rx: Receiver<TelemetryError>,
}

impl Telemetry {
    /// 连接流式端点并启动读循环
    ///
    /// 每个历史环（位姿、关节）各 `capacity` 个样本。样本按线上
    /// 单位存储，不经单位制换算。
    pub fn connect(addr: impl ToSocketAddrs, capacity: usize) -> Result<Telemetry, TelemetryError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(None)?;
        info!(peer = %stream.peer_addr()?, "connected to telemetry endpoint");

        let poses = Arc::new(HistoryRing::new(capacity));
        let joints = Arc::new(HistoryRing::new(capacity));
        let latest_pose = Arc::new(ArcSwapOption::const_empty());
        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = bounded(1);

        let reader = stream.try_clone()?;
        let thread = std::thread::spawn({
            let poses = poses.clone();
            let joints = joints.clone();
            let latest_pose = latest_pose.clone();
            let running = running.clone();
            move || {
                let err = read_loop(reader, &poses, &joints, &latest_pose);
                running.store(false, Ordering::Release);
                warn!(error = %err, "telemetry loop terminated");
                let _ = error_tx.send(err);
            }
        });

        Ok(Telemetry {
            poses,
            joints,
            latest_pose,
            running,
            stream,
            thread: Some(thread),
            error_rx,
        })
    }

    /// 位姿历史环
    pub fn poses(&self) -> &HistoryRing<Pose> {
        &self.poses
    }

    /// 关节历史环
    pub fn joints(&self) -> &HistoryRing<JointAngles> {
        &self.joints
    }

    /// 最近一个位姿样本（无锁热读）
    pub fn latest_pose(&self) -> Option<Pose> {
        self.latest_pose.load_full().map(|pose| *pose)
    }

    /// 读循环是否仍在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 主动关闭连接并回收线程
    ///
    /// 关闭连接是停止读循环的唯一途径；循环以读错误收尾属预期，
    /// 不作为失败上抛。
    pub fn stop(mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    /// 等待读循环结束并上抛终止错误
    pub fn join(mut self) -> Result<(), TelemetryError> {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        match self.error_rx.try_recv() {
            Ok(err) => Err(err),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// 专用阻塞读循环，任何读/解析错误即终止并释放连接
fn read_loop(
    mut stream: TcpStream,
    poses: &HistoryRing<Pose>,
    joints: &HistoryRing<JointAngles>,
    latest_pose: &ArcSwapOption<Pose>,
) -> TelemetryError {
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => {
                return TelemetryError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "telemetry stream closed by peer",
                ));
            }
            Ok(n) => n,
            Err(err) => return TelemetryError::Io(err),
        };

        let raw = String::from_utf8_lossy(&buf[..n]).into_owned();
        if let Err(err) = ingest(&raw, poses, joints, latest_pose) {
            return err;
        }
    }
}

/// 解析一个样本并按判别字段分发
fn ingest(
    raw: &str,
    poses: &HistoryRing<Pose>,
    joints: &HistoryRing<JointAngles>,
    latest_pose: &ArcSwapOption<Pose>,
) -> Result<(), TelemetryError> {
    let malformed = |reason: &str| TelemetryError::MalformedSample {
        reason: reason.to_string(),
        raw: raw.to_string(),
    };

    let values: Vec<f64> = raw
        .split_whitespace()
        .map(|token| token.parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| malformed("non-numeric token"))?;
    if values.len() < 2 {
        return Err(malformed("sample header missing"));
    }

    // token 0 为流序号，token 1 为判别字段
    match values[1] as i64 {
        STREAM_POSE => {
            if values.len() < 9 {
                return Err(malformed("pose sample needs 7 payload values"));
            }
            let sample = Pose::new(
                [values[2], values[3], values[4]],
                [values[5], values[6], values[7], values[8]],
            );
            poses.push(sample);
            latest_pose.store(Some(Arc::new(sample)));
            debug!(?sample, "pose sample");
        }
        STREAM_JOINTS => {
            if values.len() < 8 {
                return Err(malformed("joint sample needs 6 payload values"));
            }
            let mut angles = [0.0; 6];
            angles.copy_from_slice(&values[2..8]);
            joints.push(JointAngles(angles));
            debug!(?angles, "joint sample");
        }
        other => {
            return Err(malformed(&format!("unknown stream discriminator {other}")));
        }
    }
    Ok(())
}
