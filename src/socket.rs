/*!
ztnet套接字模块

在libzt虚拟套接字之上提供：
- 流连接（实现`std::io::Read`/`std::io::Write`）
- 监听器及其连接迭代器
- 数据报套接字
*/

use std::io;
use std::net::SocketAddr;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::backend::Backend;
use crate::error::{check, check_len, messages, Result, ZtError};
use crate::protocol::constants::{ZT_STACK_SOCKET_RD_MAX, ZT_STACK_SOCKET_WR_MAX};
use crate::protocol::{AddressFamily, Shutdown, SocketType};
use crate::sockaddr::RawSockAddr;

/// 持有一个原生描述符，关闭至多一次
pub(crate) struct Socket {
    fd: c_int,
    backend: Arc<dyn Backend>,
    socket_type: SocketType,
    connected: bool,
    shut_down: AtomicBool,
    closed: AtomicBool,
}

impl Socket {
    /// 打开指定地址族和类型的虚拟套接字
    pub(crate) fn open(
        backend: &Arc<dyn Backend>,
        family: AddressFamily,
        socket_type: SocketType,
    ) -> Result<Self> {
        let ret = backend.socket(family.as_raw(), socket_type.as_raw(), socket_type.protocol());
        let fd = check(ret, messages::SOCKET)?;
        log::debug!("Opened {:?} socket fd={} ({})", socket_type, fd, family);
        Ok(Self {
            fd,
            backend: backend.clone(),
            socket_type,
            connected: false,
            shut_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(ZtError::Closed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn bind(&self, addr: &RawSockAddr) -> Result<()> {
        let ret = self.backend.bind(self.fd, addr);
        log::debug!("bind fd={} {:?} -> {}", self.fd, addr, ret);
        check(ret, messages::BIND).map(|_| ())
    }

    pub(crate) fn listen(&self, backlog: c_int) -> Result<()> {
        let ret = self.backend.listen(self.fd, backlog);
        log::debug!("listen fd={} backlog={} -> {}", self.fd, backlog, ret);
        check(ret, messages::LISTEN).map(|_| ())
    }

    pub(crate) fn connect(&mut self, addr: &RawSockAddr) -> Result<()> {
        let ret = self.backend.connect(self.fd, addr);
        log::debug!("connect fd={} {:?} -> {}", self.fd, addr, ret);
        check(ret, messages::CONNECT)?;
        self.connected = true;
        Ok(())
    }

    fn accept(&self) -> Result<(Socket, SocketAddr)> {
        self.ensure_open()?;
        let mut peer = RawSockAddr::empty();
        let ret = self.backend.accept(self.fd, &mut peer);
        log::debug!("accept fd={} -> {}", self.fd, ret);
        let fd = check(ret, messages::ACCEPT)?;
        let socket = Socket {
            fd,
            backend: self.backend.clone(),
            socket_type: SocketType::Stream,
            connected: true,
            shut_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        // 对端地址无法解析时，socket在此处被drop并关闭
        let peer = peer.to_socket_addr()?;
        Ok((socket, peer))
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let len = buf.len().min(ZT_STACK_SOCKET_RD_MAX);
        check_len(self.backend.read(self.fd, &mut buf[..len]), messages::READ)
    }

    fn write(&self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let len = buf.len().min(ZT_STACK_SOCKET_WR_MAX);
        check_len(self.backend.write(self.fd, &buf[..len]), messages::WRITE)
    }

    fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.ensure_open()?;
        let mut from = RawSockAddr::empty();
        let n = check_len(
            self.backend.recv_from(self.fd, buf, &mut from),
            messages::RECV,
        )?;
        Ok((n, from.to_socket_addr()?))
    }

    fn send_to(&self, buf: &[u8], addr: &RawSockAddr) -> Result<usize> {
        self.ensure_open()?;
        check_len(self.backend.send_to(self.fd, buf, addr), messages::SEND)
    }

    fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.ensure_open()?;
        check(self.backend.shutdown(self.fd, how.as_raw()), messages::CLOSE)?;
        if how == Shutdown::Both {
            self.shut_down.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// 关闭描述符；重复调用直接返回成功
    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // 只有尚未双向关闭的已连接流需要先shutdown
        let needs_shutdown = self.connected
            && self.socket_type == SocketType::Stream
            && !self.shut_down.load(Ordering::Acquire);
        let shut = if needs_shutdown {
            self.backend.shutdown(self.fd, Shutdown::Both.as_raw())
        } else {
            0
        };
        let ret = self.backend.close(self.fd);
        log::debug!("close fd={} shutdown={} close={}", self.fd, shut, ret);
        check(shut, messages::CLOSE)?;
        check(ret, messages::CLOSE).map(|_| ())
    }
}

impl Drop for Socket {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close socket fd={}: {}", self.fd, e);
        }
    }
}

/// 虚拟网络上的连接
///
/// TCP连接由`connect`/`accept`产生，UDP连接由`dial_udp`产生并绑定默认对端。
pub struct Connection {
    socket: Socket,
    local: SocketAddr,
    peer: SocketAddr,
}

impl Connection {
    pub(crate) fn new(socket: Socket, local: SocketAddr, peer: SocketAddr) -> Self {
        Self {
            socket,
            local,
            peer,
        }
    }

    /// 本地地址（端口未知时为0）
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// 对端地址
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket.socket_type
    }

    /// 原生描述符
    pub fn raw_fd(&self) -> c_int {
        self.socket.fd
    }

    /// 关闭读、写或两个方向
    pub fn shutdown(&self, how: Shutdown) -> Result<()> {
        self.socket.shutdown(how)
    }

    /// 关闭连接
    pub fn close(&self) -> Result<()> {
        self.socket.close()
    }

    pub fn is_closed(&self) -> bool {
        self.socket.closed.load(Ordering::Acquire)
    }
}

impl io::Read for &Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.socket.read(buf)?)
    }
}

impl io::Write for &Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.socket.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("fd", &self.socket.fd)
            .field("type", &self.socket.socket_type)
            .field("local", &self.local)
            .field("peer", &self.peer)
            .finish()
    }
}

/// 处于监听状态的TCP套接字
pub struct Listener {
    socket: Socket,
    local: SocketAddr,
}

impl Listener {
    pub(crate) fn new(socket: Socket, local: SocketAddr) -> Self {
        Self { socket, local }
    }

    /// 接受一个连接，阻塞直到有连接到达
    pub fn accept(&self) -> Result<Connection> {
        let (socket, peer) = self.socket.accept()?;
        log::info!("Accepted connection from {} on {}", peer, self.local);
        Ok(Connection::new(socket, self.local, peer))
    }

    /// 连接迭代器，监听器关闭后结束
    pub fn incoming(&self) -> Incoming<'_> {
        Incoming { listener: self }
    }

    /// 监听地址（分配的虚拟地址 + 端口）
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn raw_fd(&self) -> c_int {
        self.socket.fd
    }

    pub fn close(&self) -> Result<()> {
        self.socket.close()
    }

    pub fn is_closed(&self) -> bool {
        self.socket.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("fd", &self.socket.fd)
            .field("local", &self.local)
            .finish()
    }
}

/// `Listener::incoming`返回的迭代器
pub struct Incoming<'a> {
    listener: &'a Listener,
}

impl Iterator for Incoming<'_> {
    type Item = Result<Connection>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.listener.is_closed() {
            return None;
        }
        match self.listener.accept() {
            // 阻塞在accept时被另一线程关闭
            Err(_) if self.listener.is_closed() => None,
            res => Some(res),
        }
    }
}

/// 绑定端口的UDP套接字
pub struct PacketConn {
    socket: Socket,
    local: SocketAddr,
}

impl PacketConn {
    pub(crate) fn new(socket: Socket, local: SocketAddr) -> Self {
        Self { socket, local }
    }

    /// 接收一个数据报，返回长度和来源地址
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf)
    }

    /// 向`addr`发送一个数据报
    pub fn send_to(&self, buf: &[u8], addr: SocketAddr) -> Result<usize> {
        self.socket.send_to(buf, &RawSockAddr::from(addr))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn raw_fd(&self) -> c_int {
        self.socket.fd
    }

    pub fn close(&self) -> Result<()> {
        self.socket.close()
    }
}

impl std::fmt::Debug for PacketConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketConn")
            .field("fd", &self.socket.fd)
            .field("local", &self.local)
            .finish()
    }
}
