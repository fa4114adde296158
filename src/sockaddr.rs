/*!
ztnet套接字地址模块

在`SocketAddr`与libzt使用的C sockaddr结构之间转换：
- 端口以网络字节序传递
- 支持IPv4（`sockaddr_in`）和IPv6（`sockaddr_in6`），其他地址族解码为错误
- 解析分配地址的文本形式
*/

use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::error::{Result, ZtError};
use crate::protocol::AddressFamily;

/// An owned C socket address with its length.
#[derive(Clone, Copy)]
pub struct RawSockAddr {
    storage: libc::sockaddr_storage,
    len: libc::socklen_t,
}

impl RawSockAddr {
    /// Zeroed storage sized for any address, used as an out-parameter.
    pub fn empty() -> Self {
        Self {
            storage: unsafe { mem::zeroed() },
            len: mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t,
        }
    }

    /// Wildcard address of `family` on `port`, as used for bind.
    pub fn unspecified(family: AddressFamily, port: u16) -> Self {
        let ip = match family {
            AddressFamily::Inet => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Inet6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        Self::from(SocketAddr::new(ip, port))
    }

    pub fn family(&self) -> Option<AddressFamily> {
        AddressFamily::from_raw(self.storage.ss_family as libc::c_int)
    }

    pub fn len(&self) -> libc::socklen_t {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length slot for calls that report back how much they wrote.
    pub fn len_mut(&mut self) -> &mut libc::socklen_t {
        &mut self.len
    }

    pub fn as_ptr(&self) -> *const libc::sockaddr {
        &self.storage as *const libc::sockaddr_storage as *const libc::sockaddr
    }

    pub fn as_mut_ptr(&mut self) -> *mut libc::sockaddr {
        &mut self.storage as *mut libc::sockaddr_storage as *mut libc::sockaddr
    }

    /// Decode back into a `SocketAddr`.
    pub fn to_socket_addr(&self) -> Result<SocketAddr> {
        match self.family() {
            Some(AddressFamily::Inet) => {
                let sa = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in) };
                let ip = Ipv4Addr::from(sa.sin_addr.s_addr.to_ne_bytes());
                Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sa.sin_port))))
            }
            Some(AddressFamily::Inet6) => {
                let sa = unsafe { &*(self.as_ptr() as *const libc::sockaddr_in6) };
                Ok(SocketAddr::V6(SocketAddrV6::new(
                    Ipv6Addr::from(sa.sin6_addr.s6_addr),
                    u16::from_be(sa.sin6_port),
                    sa.sin6_flowinfo,
                    sa.sin6_scope_id,
                )))
            }
            None => Err(ZtError::AddressFamily {
                expected: "IPv4 or IPv6",
                got: "unknown",
            }),
        }
    }
}

impl From<SocketAddr> for RawSockAddr {
    fn from(addr: SocketAddr) -> Self {
        let mut raw = Self::empty();
        match addr {
            SocketAddr::V4(v4) => {
                let sa = unsafe { &mut *(raw.as_mut_ptr() as *mut libc::sockaddr_in) };
                sa.sin_family = libc::AF_INET as libc::sa_family_t;
                sa.sin_port = v4.port().to_be();
                sa.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
                raw.len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
            }
            SocketAddr::V6(v6) => {
                let sa = unsafe { &mut *(raw.as_mut_ptr() as *mut libc::sockaddr_in6) };
                sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
                sa.sin6_port = v6.port().to_be();
                sa.sin6_flowinfo = v6.flowinfo();
                sa.sin6_addr.s6_addr = v6.ip().octets();
                sa.sin6_scope_id = v6.scope_id();
                raw.len = mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
            }
        }
        raw
    }
}

impl std::fmt::Debug for RawSockAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_socket_addr() {
            Ok(addr) => write!(f, "RawSockAddr({addr})"),
            Err(_) => write!(f, "RawSockAddr(family={})", self.storage.ss_family),
        }
    }
}

/// Parse the text libzt writes into an address buffer.
///
/// The buffer is NUL padded and holds either `addr/prefix` or a bare address.
/// An empty or unparsable buffer means no address is assigned yet.
pub fn parse_assigned_address(buf: &[u8]) -> Option<IpAddr> {
    let trimmed: &[u8] = {
        let start = buf.iter().position(|&b| b != 0)?;
        let end = buf.iter().rposition(|&b| b != 0)? + 1;
        &buf[start..end]
    };
    let text = std::str::from_utf8(trimmed).ok()?.trim();
    let ip = text.split_once('/').map_or(text, |(ip, _)| ip);
    ip.parse().ok()
}
