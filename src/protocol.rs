/*!
ztnet协议定义模块

定义与libzt交互所需的常量和枚举，包括：
- 地址族和套接字类型
- 关闭方式
- libzt常量
*/

use std::fmt;
use std::os::raw::c_int;

/// 地址族
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4
    Inet,
    /// IPv6
    Inet6,
}

impl AddressFamily {
    /// 转换为C层的地址族常量
    pub fn as_raw(self) -> c_int {
        match self {
            AddressFamily::Inet => libc::AF_INET,
            AddressFamily::Inet6 => libc::AF_INET6,
        }
    }

    /// 从C层的地址族常量解析
    pub fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            libc::AF_INET => Some(AddressFamily::Inet),
            libc::AF_INET6 => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AddressFamily::Inet => "IPv4",
            AddressFamily::Inet6 => "IPv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 套接字类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketType {
    /// TCP流
    Stream,
    /// UDP数据报
    Datagram,
}

impl SocketType {
    pub fn as_raw(self) -> c_int {
        match self {
            SocketType::Stream => libc::SOCK_STREAM,
            SocketType::Datagram => libc::SOCK_DGRAM,
        }
    }

    /// 与套接字类型配套的协议号
    pub fn protocol(self) -> c_int {
        match self {
            SocketType::Stream => 0,
            SocketType::Datagram => libc::IPPROTO_UDP,
        }
    }
}

/// 关闭方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    Read,
    Write,
    Both,
}

impl Shutdown {
    pub fn as_raw(self) -> c_int {
        match self {
            Shutdown::Read => libc::SHUT_RD,
            Shutdown::Write => libc::SHUT_WR,
            Shutdown::Both => libc::SHUT_RDWR,
        }
    }
}

/// libzt常量
pub mod constants {
    /// 网络ID/节点ID的十六进制长度
    pub const ZTO_ID_LEN: usize = 16;

    /// 地址查询缓冲区长度（可容纳带前缀的IPv6字符串）
    pub const ZT_MAX_IPADDR_LEN: usize = 64;

    /// 单次写入的最大字节数
    pub const ZT_STACK_SOCKET_WR_MAX: usize = 4096;

    /// 单次读取的最大字节数
    pub const ZT_STACK_SOCKET_RD_MAX: usize = 4096 * 4;

    /// home路径最大长度
    pub const ZT_HOME_PATH_MAX_LEN: usize = 256;

    /// 成功
    pub const ZT_ERR_OK: i32 = 0;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_raw_values_round_trip() {
        for family in [AddressFamily::Inet, AddressFamily::Inet6] {
            assert_eq!(AddressFamily::from_raw(family.as_raw()), Some(family));
        }
        assert_eq!(AddressFamily::from_raw(libc::AF_UNIX), None);
    }

    #[test]
    fn datagram_uses_udp() {
        assert_eq!(SocketType::Datagram.protocol(), libc::IPPROTO_UDP);
        assert_eq!(SocketType::Stream.protocol(), 0);
    }
}
