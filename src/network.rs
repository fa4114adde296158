/*!
ztnet网络模块

加入虚拟网络并在其上创建套接字，包括：
- 网络ID解析
- 服务启动和网络加入
- 分配地址查询
- TCP监听/连接、UDP绑定/拨号
*/

use std::ffi::CString;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backend::Backend;
use crate::error::{messages, Result, ZtError};
use crate::ffi::Libzt;
use crate::protocol::constants::{ZTO_ID_LEN, ZT_ERR_OK, ZT_HOME_PATH_MAX_LEN, ZT_MAX_IPADDR_LEN};
use crate::protocol::{AddressFamily, SocketType};
use crate::sockaddr::{parse_assigned_address, RawSockAddr};
use crate::socket::{Connection, Listener, PacketConn, Socket};
use crate::DEFAULT_BACKLOG;

/// 虚拟网络ID（16位十六进制）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(u64);

impl NetworkId {
    /// ZeroTier公共网络
    pub const EARTH: NetworkId = NetworkId(0x8056_c2e2_1c00_0001);

    pub const fn new(raw: u64) -> Self {
        NetworkId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl From<u64> for NetworkId {
    fn from(raw: u64) -> Self {
        NetworkId(raw)
    }
}

impl FromStr for NetworkId {
    type Err = ZtError;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != ZTO_ID_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ZtError::InvalidNetworkId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(NetworkId)
            .map_err(|_| ZtError::InvalidNetworkId(s.to_string()))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for NetworkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 已加入的虚拟网络
pub struct ZeroTier {
    backend: Arc<dyn Backend>,
    id: NetworkId,
    id_c: CString,
    home_path: PathBuf,
}

impl ZeroTier {
    /// 加载libzt并加入网络
    pub fn init<P: AsRef<Path>>(id: &str, home_path: P) -> Result<Self> {
        let id: NetworkId = id.parse()?;
        let backend: Arc<dyn Backend> = Arc::new(Libzt::load()?);
        Self::with_backend(backend, id, home_path)
    }

    /// 使用指定后端加入网络
    pub fn with_backend<P: AsRef<Path>>(
        backend: Arc<dyn Backend>,
        id: NetworkId,
        home_path: P,
    ) -> Result<Self> {
        let home_path = home_path.as_ref().to_path_buf();
        let home_c = home_path_cstring(&home_path)?;
        let id_c = CString::new(id.to_string())
            .map_err(|_| ZtError::InvalidNetworkId(id.to_string()))?;

        log::info!("Joining network {} with home {}", id, home_path.display());
        let ret = backend.start(&home_c, &id_c);
        if ret != ZT_ERR_OK {
            log::error!("zts_simple_start returned {}", ret);
            return Err(ZtError::Failed {
                message: messages::JOIN,
                code: ret,
            });
        }

        Ok(Self {
            backend,
            id,
            id_c,
            home_path,
        })
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    pub fn home_path(&self) -> &Path {
        &self.home_path
    }

    /// 查询指定地址族的分配地址，未分配时返回None
    pub fn address(&self, family: AddressFamily) -> Option<IpAddr> {
        let mut buf = [0u8; ZT_MAX_IPADDR_LEN];
        let ret = self.backend.get_address(&self.id_c, family, &mut buf);
        if ret < 0 {
            log::debug!("No {} address assigned on {} ({})", family, self.id, ret);
            return None;
        }
        let ip = parse_assigned_address(&buf)?;
        match (family, ip) {
            (AddressFamily::Inet, IpAddr::V4(_)) | (AddressFamily::Inet6, IpAddr::V6(_)) => Some(ip),
            _ => None,
        }
    }

    pub fn ipv4_address(&self) -> Option<Ipv4Addr> {
        match self.address(AddressFamily::Inet) {
            Some(IpAddr::V4(ip)) => Some(ip),
            _ => None,
        }
    }

    pub fn ipv6_address(&self) -> Option<Ipv6Addr> {
        match self.address(AddressFamily::Inet6) {
            Some(IpAddr::V6(ip)) => Some(ip),
            _ => None,
        }
    }

    /// 分配地址，未分配时为该地址族的通配地址
    fn local_ip(&self, family: AddressFamily) -> IpAddr {
        self.address(family).unwrap_or(match family {
            AddressFamily::Inet => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        })
    }

    /// 在IPv6上监听TCP
    pub fn listen6(&self, port: u16) -> Result<Listener> {
        self.listen_with_backlog(AddressFamily::Inet6, port, DEFAULT_BACKLOG)
    }

    /// 在IPv4上监听TCP
    pub fn listen4(&self, port: u16) -> Result<Listener> {
        self.listen_with_backlog(AddressFamily::Inet, port, DEFAULT_BACKLOG)
    }

    pub fn listen_with_backlog(
        &self,
        family: AddressFamily,
        port: u16,
        backlog: i32,
    ) -> Result<Listener> {
        let socket = Socket::open(&self.backend, family, SocketType::Stream)?;
        socket.bind(&RawSockAddr::unspecified(family, port))?;
        socket.listen(backlog)?;

        let local = SocketAddr::new(self.local_ip(family), port);
        log::info!("Listening on {}", local);
        Ok(Listener::new(socket, local))
    }

    /// 在IPv6上绑定UDP端口
    pub fn listen_udp6(&self, port: u16) -> Result<PacketConn> {
        self.listen_udp(AddressFamily::Inet6, port)
    }

    /// 在IPv4上绑定UDP端口
    pub fn listen_udp4(&self, port: u16) -> Result<PacketConn> {
        self.listen_udp(AddressFamily::Inet, port)
    }

    fn listen_udp(&self, family: AddressFamily, port: u16) -> Result<PacketConn> {
        let socket = Socket::open(&self.backend, family, SocketType::Datagram)?;
        socket.bind(&RawSockAddr::unspecified(family, port))?;

        let local = SocketAddr::new(self.local_ip(family), port);
        log::info!("Bound UDP socket on {}", local);
        Ok(PacketConn::new(socket, local))
    }

    /// 通过IPv6建立TCP连接
    pub fn connect6(&self, ip: Ipv6Addr, port: u16) -> Result<Connection> {
        self.dial(SocketAddr::new(IpAddr::V6(ip), port), SocketType::Stream)
    }

    /// 通过IPv4建立TCP连接
    pub fn connect4(&self, ip: Ipv4Addr, port: u16) -> Result<Connection> {
        self.dial(SocketAddr::new(IpAddr::V4(ip), port), SocketType::Stream)
    }

    /// 建立IPv6 UDP连接，写入的数据发往该对端
    pub fn dial_udp6(&self, ip: Ipv6Addr, port: u16) -> Result<Connection> {
        self.dial(SocketAddr::new(IpAddr::V6(ip), port), SocketType::Datagram)
    }

    pub fn dial_udp4(&self, ip: Ipv4Addr, port: u16) -> Result<Connection> {
        self.dial(SocketAddr::new(IpAddr::V4(ip), port), SocketType::Datagram)
    }

    /// 按地址族连接到`addr`
    pub fn connect(&self, addr: SocketAddr) -> Result<Connection> {
        self.dial(addr, SocketType::Stream)
    }

    fn dial(&self, peer: SocketAddr, socket_type: SocketType) -> Result<Connection> {
        let family = match peer {
            SocketAddr::V4(_) => AddressFamily::Inet,
            SocketAddr::V6(_) => AddressFamily::Inet6,
        };
        let mut socket = Socket::open(&self.backend, family, socket_type)?;
        socket.connect(&RawSockAddr::from(peer))?;

        let local = SocketAddr::new(self.local_ip(family), 0);
        log::info!("Connected to {} ({:?})", peer, socket_type);
        Ok(Connection::new(socket, local, peer))
    }
}

impl fmt::Debug for ZeroTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZeroTier")
            .field("id", &self.id)
            .field("home_path", &self.home_path)
            .finish()
    }
}

/// home路径转换为C字符串
fn home_path_cstring(path: &Path) -> Result<CString> {
    let s = path
        .to_str()
        .ok_or_else(|| ZtError::InvalidHomePath(path.to_string_lossy().into_owned()))?;
    if s.is_empty() || s.len() >= ZT_HOME_PATH_MAX_LEN {
        return Err(ZtError::InvalidHomePath(s.to_string()));
    }
    CString::new(s).map_err(|_| ZtError::InvalidHomePath(s.to_string()))
}
