/*!
ztnet Client - 通过虚拟网络连接对端并发送消息

客户端主要功能：
- 加入ZeroTier虚拟网络
- 显示分配的IPv6地址
- 连接到指定对端并发送消息
*/

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use std::net::Ipv6Addr;
use std::sync::Arc;
use tokio::time::Duration;
use ztnet::{Backend, HomeDir, Libzt, NetworkId, ZeroTier};

mod config;

use config::ClientConfig;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 对端的虚拟IPv6地址
    #[arg(required_unless_present = "init_config")]
    address: Option<Ipv6Addr>,

    /// 配置文件路径
    #[arg(short, long, default_value = "ztnet-client.toml")]
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

    /// 对端端口
    #[arg(short, long)]
    port: Option<u16>,

    /// 发送的消息
    #[arg(short, long)]
    message: Option<String>,

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
    std::process::exit(code);
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("ztnet Client {} starting...", ztnet::VERSION);

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
        config.client.port = port;
    }
    if let Some(message) = args.message {
        config.client.message = message;
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
    println!("My Address [{}]", addr);

    let remote = args.address.ok_or("missing peer address")?;
    let port = config.client.port;
    let message = config.client.message.clone();

    // 连接和写入在libzt内部阻塞
    let zt = Arc::new(zt);
    let conn = {
        let zt = zt.clone();
        tokio::task::spawn_blocking(move || -> ztnet::Result<_> {
            let mut conn = zt.connect6(remote, port)?;
            println!("Connected");
            let sent = send_message(&mut conn, &message)?;
            println!("Sent: {}", sent);
            Ok(conn)
        })
        .await??
    };

    tokio::time::sleep(Duration::from_millis(config.client.linger_ms)).await;

    conn.close()?;
    log::info!("ztnet Client stopped");
    Ok(())
}

/// 完整写出消息，单次写入受libzt上限约束
fn send_message<W: Write>(conn: &mut W, message: &str) -> std::io::Result<usize> {
    conn.write_all(message.as_bytes())?;
    Ok(message.len())
}

/// 加载libzt并加入配置的网络
fn join(config: &ClientConfig, home: &HomeDir) -> Result<ZeroTier, ztnet::ZtError> {
    let backend: Arc<dyn Backend> = match &config.network.library {
        Some(path) => Arc::new(Libzt::open(path)?),
        None => Arc::new(Libzt::load()?),
    };
    ZeroTier::with_backend(backend, config.network.id, home)
}
