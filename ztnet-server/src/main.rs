/*!
ztnet Server - 通过虚拟网络接受连接并打印收到的数据

服务端主要功能：
- 加入ZeroTier虚拟网络
- 在分配的IPv6地址上监听TCP端口
- 逐个接受连接并打印收到的数据
*/

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Read;
use std::sync::Arc;
use ztnet::{AddressFamily, Backend, HomeDir, Libzt, Listener, NetworkId, ZeroTier};

mod config;

use config::ServerConfig;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "ztnet-server.toml")]
    config: String,

    /// 启用调试日志
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    debug: bool,

    /// 网络ID
    #[arg(short, long, env = "ZTNET_NETWORK")]
    network: Option<NetworkId>,

    /// home目录
    #[arg(long)]
    home: Option<String>,

    /// 监听端口
    #[arg(short, long)]
    port: Option<u16>,

    /// libzt路径
    #[arg(long)]
    library: Option<String>,

    /// 将当前配置写入配置文件后退出
    #[arg(long, action = clap::ArgAction::SetTrue)]
    init_config: bool,
}

#[tokio::main]
async fn main() {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志
    let mut logger = Builder::new();
    logger.filter(None, if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    logger.init();

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    };
    // accept/read可能仍阻塞在libzt中，不等待blocking线程
    std::process::exit(code);
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("ztnet Server {} starting...", ztnet::VERSION);

    // 加载配置
    let mut config = config::load_or_default(&args.config)?;

    // 从命令行参数覆盖配置
    if let Some(network) = args.network {
        config.network.id = network;
    }
    if let Some(home) = args.home {
        config.network.home = Some(home);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(library) = args.library {
        config.network.library = Some(library);
    }
    config::validate_config(&config)?;

    if args.init_config {
        config::save_config(&config, &args.config)?;
        println!("Wrote {}", args.config);
        return Ok(());
    }

    log::debug!("Config loaded: {:?}", config);

    let home = match &config.network.home {
        Some(path) => HomeDir::persistent(path)?,
        None => HomeDir::temporary()?,
    };
    println!("Using {} as ZeroTier home path", home.path().display());

    let zt = join(&config, &home)?;

    let addr = zt.ipv6_address().ok_or("no IPv6 address assigned")?;
    let port = config.server.port;
    println!("Listening at [{}]:{}", addr, port);

    let listener = Arc::new(zt.listen_with_backlog(
        AddressFamily::Inet6,
        port,
        config.server.backlog,
    )?);

    let buffer_size = config.server.buffer_size;
    let serving = {
        let listener = listener.clone();
        tokio::task::spawn_blocking(move || serve(&listener, buffer_size))
    };

    // 主循环 - 处理信号和优雅关闭
    tokio::select! {
        res = serving => res??,
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received shutdown signal, stopping server...");
            listener.close()?;
        }
    }

    log::info!("ztnet Server stopped");
    Ok(())
}

/// 逐个接受连接，读取直到对端关闭
fn serve(listener: &Listener, buffer_size: usize) -> ztnet::Result<()> {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        println!("Waiting for connection");
        let mut conn = listener.accept()?;
        println!("Accepted connection");

        loop {
            match conn.read(&mut buffer) {
                Ok(0) => break,
                Ok(len) => {
                    println!("Received: {} {}", String::from_utf8_lossy(&buffer[..len]), len);
                }
                Err(e) => {
                    log::warn!("Read from {} failed: {}", conn.peer_addr(), e);
                    break;
                }
            }
        }

        if let Err(e) = conn.close() {
            log::warn!("Failed to close connection from {}: {}", conn.peer_addr(), e);
        }
    }
}

/// 加载libzt并加入配置的网络
fn join(config: &ServerConfig, home: &HomeDir) -> Result<ZeroTier, ztnet::ZtError> {
    let backend: Arc<dyn Backend> = match &config.network.library {
        Some(path) => Arc::new(Libzt::open(path)?),
        None => Arc::new(Libzt::load()?),
    };
    ZeroTier::with_backend(backend, config.network.id, home)
}
