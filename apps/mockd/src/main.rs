//! # mockd
//!
//! 独立运行的控制器协议桩守护进程。
//!
//! ```bash
//! # 默认端口 5000，PORT 环境变量优先于 --port
//! mockd
//! mockd --port 6000
//! PORT=6000 mockd
//! ```
//!
//! 一次服务一条连接；对端断开后继续接受下一条。Ctrl-C 退出。

use anyhow::Result;
use clap::Parser;
use rapidlink_mock::MockServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mock controller daemon for RAPID link integration testing
#[derive(Parser, Debug)]
#[command(name = "mockd")]
#[command(version)]
struct Cli {
    /// 监听端口（PORT 环境变量优先）
    #[arg(short, long, default_value_t = 5000)]
    port: u16,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    ctrlc::set_handler(|| {
        info!("interrupted, shutting down");
        std::process::exit(0);
    })?;

    let server = MockServer::bind(cli.port)?;
    loop {
        server.serve()?;
    }
}
