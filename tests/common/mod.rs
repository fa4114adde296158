//! In-memory stand-in for libzt.
//!
//! Every socket lives in one process-local table. Stream connects pair two
//! descriptors, datagrams are routed by bound port. Calls that would block in
//! libzt return -1 here so tests never hang.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::CStr;
use std::net::{IpAddr, SocketAddr};
use std::os::raw::c_int;
use std::sync::Mutex;

use ztnet::sockaddr::RawSockAddr;
use ztnet::{AddressFamily, Backend};

pub const V6: &str = "fd80:56c2:e21c:0:199:9383:4a02:1";
pub const V4: &str = "10.147.17.5";

/// Ephemeral ports are derived from the descriptor.
const EPHEMERAL_BASE: u16 = 50000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Start,
    Socket,
    Bind,
    Listen,
    Accept,
    Connect,
    Read,
    Write,
    RecvFrom,
    SendTo,
    Shutdown,
    Close,
}

#[derive(Debug, Default)]
struct Sock {
    family: c_int,
    socket_type: c_int,
    protocol: c_int,
    port: Option<u16>,
    backlog: Option<c_int>,
    peer_fd: Option<c_int>,
    peer_gone: bool,
    default_peer: Option<SocketAddr>,
    inbox: VecDeque<u8>,
    datagrams: VecDeque<(Vec<u8>, SocketAddr)>,
    pending: VecDeque<(c_int, SocketAddr)>,
}

#[derive(Debug, Default)]
struct State {
    next_fd: c_int,
    sockets: HashMap<c_int, Sock>,
    closes: HashMap<c_int, usize>,
    shutdowns: Vec<(c_int, c_int)>,
    failing: HashSet<Op>,
    joined: Option<(String, String)>,
    ipv4: Option<String>,
    ipv6: Option<String>,
    anonymous_datagrams: bool,
    binds: Vec<(c_int, SocketAddr)>,
}

pub struct Loopback {
    state: Mutex<State>,
}

impl Loopback {
    pub fn new() -> Self {
        let state = State {
            next_fd: 3,
            ipv4: Some(format!("{V4}/24")),
            ipv6: Some(format!("{V6}/88")),
            ..State::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Make every call of `op` return a failure sentinel.
    pub fn fail(&self, op: Op) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn unassign_addresses(&self) {
        let mut st = self.state.lock().unwrap();
        st.ipv4 = None;
        st.ipv6 = None;
    }

    /// Answer IPv6 address queries with `text` verbatim.
    pub fn assign_ipv6(&self, text: &str) {
        self.state.lock().unwrap().ipv6 = Some(text.to_string());
    }

    /// Deliver datagrams without filling in the source address.
    pub fn anonymous_datagrams(&self) {
        self.state.lock().unwrap().anonymous_datagrams = true;
    }

    pub fn joined(&self) -> Option<(String, String)> {
        self.state.lock().unwrap().joined.clone()
    }

    pub fn close_count(&self, fd: c_int) -> usize {
        self.state.lock().unwrap().closes.get(&fd).copied().unwrap_or(0)
    }

    pub fn shutdowns(&self) -> Vec<(c_int, c_int)> {
        self.state.lock().unwrap().shutdowns.clone()
    }

    pub fn open_sockets(&self) -> usize {
        self.state.lock().unwrap().sockets.len()
    }

    pub fn binds(&self) -> Vec<(c_int, SocketAddr)> {
        self.state.lock().unwrap().binds.clone()
    }

    /// (family, type, protocol, backlog) recorded for `fd`.
    pub fn describe(&self, fd: c_int) -> Option<(c_int, c_int, c_int, Option<c_int>)> {
        let st = self.state.lock().unwrap();
        st.sockets
            .get(&fd)
            .map(|s| (s.family, s.socket_type, s.protocol, s.backlog))
    }

    /// Highest descriptor handed out so far.
    pub fn last_fd(&self) -> c_int {
        self.state.lock().unwrap().next_fd - 1
    }
}

impl State {
    fn failing(&self, op: Op) -> bool {
        self.failing.contains(&op)
    }

    fn assigned(&self, family: c_int) -> IpAddr {
        let text = if family == libc::AF_INET { V4 } else { V6 };
        text.parse().unwrap()
    }

    fn local_addr(&self, fd: c_int) -> SocketAddr {
        let sock = &self.sockets[&fd];
        let port = sock.port.unwrap_or(EPHEMERAL_BASE + fd as u16);
        SocketAddr::new(self.assigned(sock.family), port)
    }

    fn find_bound(&self, socket_type: c_int, addr: &SocketAddr) -> Option<c_int> {
        let family = match addr {
            SocketAddr::V4(_) => libc::AF_INET,
            SocketAddr::V6(_) => libc::AF_INET6,
        };
        self.sockets
            .iter()
            .find(|(_, s)| {
                s.family == family && s.socket_type == socket_type && s.port == Some(addr.port())
            })
            .map(|(fd, _)| *fd)
    }

    fn alloc(&mut self, sock: Sock) -> c_int {
        let fd = self.next_fd;
        self.next_fd += 1;
        self.sockets.insert(fd, sock);
        fd
    }
}

impl Backend for Loopback {
    fn start(&self, home_path: &CStr, network_id: &CStr) -> c_int {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Start) {
            return -1;
        }
        st.joined = Some((
            home_path.to_string_lossy().into_owned(),
            network_id.to_string_lossy().into_owned(),
        ));
        0
    }

    fn get_address(&self, _network_id: &CStr, family: AddressFamily, buf: &mut [u8]) -> c_int {
        let st = self.state.lock().unwrap();
        let text = match family {
            AddressFamily::Inet => st.ipv4.as_deref(),
            AddressFamily::Inet6 => st.ipv6.as_deref(),
        };
        match text {
            Some(text) => {
                buf[..text.len()].copy_from_slice(text.as_bytes());
                0
            }
            None => -1,
        }
    }

    fn socket(&self, family: c_int, socket_type: c_int, protocol: c_int) -> c_int {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Socket) {
            return -1;
        }
        st.alloc(Sock {
            family,
            socket_type,
            protocol,
            ..Sock::default()
        })
    }

    fn bind(&self, fd: c_int, addr: &RawSockAddr) -> c_int {
        let mut st = self.state.lock().unwrap();
        let Ok(addr) = addr.to_socket_addr() else {
            return -1;
        };
        if st.failing(Op::Bind) || !st.sockets.contains_key(&fd) {
            return -1;
        }
        let socket_type = st.sockets[&fd].socket_type;
        if st.find_bound(socket_type, &addr).is_some() {
            return -1;
        }
        st.binds.push((fd, addr));
        st.sockets.get_mut(&fd).unwrap().port = Some(addr.port());
        0
    }

    fn listen(&self, fd: c_int, backlog: c_int) -> c_int {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Listen) {
            return -1;
        }
        match st.sockets.get_mut(&fd) {
            Some(sock) if sock.port.is_some() => {
                sock.backlog = Some(backlog);
                0
            }
            _ => -1,
        }
    }

    fn accept(&self, fd: c_int, addr: &mut RawSockAddr) -> c_int {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Accept) {
            return -1;
        }
        let Some(sock) = st.sockets.get_mut(&fd) else {
            return -1;
        };
        match sock.pending.pop_front() {
            Some((new_fd, peer)) => {
                *addr = RawSockAddr::from(peer);
                new_fd
            }
            None => -1,
        }
    }

    fn connect(&self, fd: c_int, addr: &RawSockAddr) -> c_int {
        let mut st = self.state.lock().unwrap();
        let Ok(addr) = addr.to_socket_addr() else {
            return -1;
        };
        if st.failing(Op::Connect) || !st.sockets.contains_key(&fd) {
            return -1;
        }
        let (family, socket_type) = {
            let s = &st.sockets[&fd];
            (s.family, s.socket_type)
        };

        if socket_type == libc::SOCK_DGRAM {
            let sock = st.sockets.get_mut(&fd).unwrap();
            sock.default_peer = Some(addr);
            sock.port = Some(EPHEMERAL_BASE + fd as u16);
            return 0;
        }

        let Some(listener) = st.find_bound(libc::SOCK_STREAM, &addr) else {
            return -1;
        };
        if st.sockets[&listener].backlog.is_none() {
            return -1;
        }
        let client_local = st.local_addr(fd);
        let server_fd = st.alloc(Sock {
            family,
            socket_type,
            port: Some(addr.port()),
            peer_fd: Some(fd),
            ..Sock::default()
        });
        st.sockets.get_mut(&fd).unwrap().peer_fd = Some(server_fd);
        st.sockets
            .get_mut(&listener)
            .unwrap()
            .pending
            .push_back((server_fd, client_local));
        0
    }

    fn read(&self, fd: c_int, buf: &mut [u8]) -> isize {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Read) {
            return -1;
        }
        let Some(sock) = st.sockets.get_mut(&fd) else {
            return -1;
        };
        if sock.socket_type == libc::SOCK_DGRAM {
            return match sock.datagrams.pop_front() {
                Some((data, _)) => {
                    let n = data.len().min(buf.len());
                    buf[..n].copy_from_slice(&data[..n]);
                    n as isize
                }
                None => -1,
            };
        }
        if sock.inbox.is_empty() {
            return if sock.peer_gone { 0 } else { -1 };
        }
        let n = sock.inbox.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(sock.inbox.drain(..n)) {
            *slot = byte;
        }
        n as isize
    }

    fn write(&self, fd: c_int, buf: &[u8]) -> isize {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Write) || !st.sockets.contains_key(&fd) {
            return -1;
        }
        let (socket_type, peer_fd, default_peer, gone) = {
            let s = &st.sockets[&fd];
            (s.socket_type, s.peer_fd, s.default_peer, s.peer_gone)
        };
        if socket_type == libc::SOCK_DGRAM {
            let Some(dest) = default_peer else {
                return -1;
            };
            let from = st.local_addr(fd);
            if let Some(target) = st.find_bound(libc::SOCK_DGRAM, &dest) {
                st.sockets
                    .get_mut(&target)
                    .unwrap()
                    .datagrams
                    .push_back((buf.to_vec(), from));
            }
            return buf.len() as isize;
        }
        match peer_fd {
            Some(peer) if !gone => {
                st.sockets.get_mut(&peer).unwrap().inbox.extend(buf);
                buf.len() as isize
            }
            _ => -1,
        }
    }

    fn recv_from(&self, fd: c_int, buf: &mut [u8], addr: &mut RawSockAddr) -> isize {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::RecvFrom) {
            return -1;
        }
        let anonymous = st.anonymous_datagrams;
        let Some(sock) = st.sockets.get_mut(&fd) else {
            return -1;
        };
        match sock.datagrams.pop_front() {
            Some((data, from)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if !anonymous {
                    *addr = RawSockAddr::from(from);
                }
                n as isize
            }
            None => -1,
        }
    }

    fn send_to(&self, fd: c_int, buf: &[u8], addr: &RawSockAddr) -> isize {
        let mut st = self.state.lock().unwrap();
        let Ok(dest) = addr.to_socket_addr() else {
            return -1;
        };
        if st.failing(Op::SendTo) || !st.sockets.contains_key(&fd) {
            return -1;
        }
        let from = st.local_addr(fd);
        if let Some(target) = st.find_bound(libc::SOCK_DGRAM, &dest) {
            st.sockets
                .get_mut(&target)
                .unwrap()
                .datagrams
                .push_back((buf.to_vec(), from));
        }
        buf.len() as isize
    }

    fn shutdown(&self, fd: c_int, how: c_int) -> c_int {
        let mut st = self.state.lock().unwrap();
        if st.failing(Op::Shutdown) || !st.sockets.contains_key(&fd) {
            return -1;
        }
        st.shutdowns.push((fd, how));
        0
    }

    fn close(&self, fd: c_int) -> c_int {
        let mut st = self.state.lock().unwrap();
        *st.closes.entry(fd).or_insert(0) += 1;
        if st.failing(Op::Close) {
            return -1;
        }
        match st.sockets.remove(&fd) {
            Some(sock) => {
                if let Some(peer) = sock.peer_fd.and_then(|p| st.sockets.get_mut(&p)) {
                    peer.peer_gone = true;
                }
                0
            }
            None => -1,
        }
    }
}
