/*!
ztnet原生库模块

运行时加载libzt共享库：
- 打开库时通过`libloading`解析`zts_*`符号
- 未安装libzt时也能编译和测试
*/

use std::env;
use std::ffi::{CStr, OsStr, OsString};
use std::os::raw::{c_char, c_int, c_void};

use libc::{size_t, sockaddr, socklen_t, ssize_t};
use libloading::Library;

use crate::backend::Backend;
use crate::error::{Result, ZtError};
use crate::protocol::AddressFamily;
use crate::sockaddr::RawSockAddr;

/// Environment variable naming an explicit libzt path.
pub const LIBZT_ENV: &str = "ZTNET_LIBZT";

type StartFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type GetAddressFn = unsafe extern "C" fn(*const c_char, *mut c_char, size_t) -> c_int;
type SocketFn = unsafe extern "C" fn(c_int, c_int, c_int) -> c_int;
type AddrFn = unsafe extern "C" fn(c_int, *const sockaddr, socklen_t) -> c_int;
type ListenFn = unsafe extern "C" fn(c_int, c_int) -> c_int;
type AcceptFn = unsafe extern "C" fn(c_int, *mut sockaddr, *mut socklen_t) -> c_int;
type ReadFn = unsafe extern "C" fn(c_int, *mut c_void, size_t) -> ssize_t;
type WriteFn = unsafe extern "C" fn(c_int, *const c_void, size_t) -> ssize_t;
type RecvFromFn =
    unsafe extern "C" fn(c_int, *mut c_void, size_t, c_int, *mut sockaddr, *mut socklen_t) -> ssize_t;
type SendToFn =
    unsafe extern "C" fn(c_int, *const c_void, size_t, c_int, *const sockaddr, socklen_t) -> ssize_t;
type ShutdownFn = unsafe extern "C" fn(c_int, c_int) -> c_int;
type CloseFn = unsafe extern "C" fn(c_int) -> c_int;

/// The libzt C API, loaded from a shared library.
pub struct Libzt {
    simple_start: StartFn,
    get_ipv4_address: GetAddressFn,
    get_ipv6_address: GetAddressFn,
    socket: SocketFn,
    bind: AddrFn,
    listen: ListenFn,
    accept: AcceptFn,
    connect: AddrFn,
    read: ReadFn,
    write: WriteFn,
    recvfrom: RecvFromFn,
    sendto: SendToFn,
    shutdown: ShutdownFn,
    close: CloseFn,
    // Keeps the function pointers above valid.
    _library: Library,
}

impl Libzt {
    /// Open libzt from `$ZTNET_LIBZT`, falling back to the platform's default
    /// library name (`libzt.so`, `libzt.dylib`, `zt.dll`).
    pub fn load() -> Result<Self> {
        let path = env::var_os(LIBZT_ENV).unwrap_or_else(default_library_name);
        Self::open(path)
    }

    /// Open libzt from an explicit path.
    pub fn open<P: AsRef<OsStr>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let library = unsafe { Library::new(path) }
            .map_err(|e| ZtError::Library(format!("{}: {}", path.to_string_lossy(), e)))?;
        log::debug!("Loaded libzt from {}", path.to_string_lossy());

        Ok(Self {
            simple_start: symbol(&library, b"zts_simple_start\0")?,
            get_ipv4_address: symbol(&library, b"zts_get_ipv4_address\0")?,
            get_ipv6_address: symbol(&library, b"zts_get_ipv6_address\0")?,
            socket: symbol(&library, b"zts_socket\0")?,
            bind: symbol(&library, b"zts_bind\0")?,
            listen: symbol(&library, b"zts_listen\0")?,
            accept: symbol(&library, b"zts_accept\0")?,
            connect: symbol(&library, b"zts_connect\0")?,
            read: symbol(&library, b"zts_read\0")?,
            write: symbol(&library, b"zts_write\0")?,
            recvfrom: symbol(&library, b"zts_recvfrom\0")?,
            sendto: symbol(&library, b"zts_sendto\0")?,
            shutdown: symbol(&library, b"zts_shutdown\0")?,
            close: symbol(&library, b"zts_close\0")?,
            _library: library,
        })
    }
}

fn default_library_name() -> OsString {
    libloading::library_filename("zt")
}

fn symbol<T: Copy>(library: &Library, name: &'static [u8]) -> Result<T> {
    let sym = unsafe { library.get::<T>(name) }.map_err(|e| {
        let name = String::from_utf8_lossy(&name[..name.len() - 1]);
        ZtError::Library(format!("missing symbol {name}: {e}"))
    })?;
    Ok(*sym)
}

impl Backend for Libzt {
    fn start(&self, home_path: &CStr, network_id: &CStr) -> c_int {
        unsafe { (self.simple_start)(home_path.as_ptr(), network_id.as_ptr()) }
    }

    fn get_address(&self, network_id: &CStr, family: AddressFamily, buf: &mut [u8]) -> c_int {
        let f = match family {
            AddressFamily::Inet => self.get_ipv4_address,
            AddressFamily::Inet6 => self.get_ipv6_address,
        };
        unsafe { f(network_id.as_ptr(), buf.as_mut_ptr() as *mut c_char, buf.len()) }
    }

    fn socket(&self, family: c_int, socket_type: c_int, protocol: c_int) -> c_int {
        unsafe { (self.socket)(family, socket_type, protocol) }
    }

    fn bind(&self, fd: c_int, addr: &RawSockAddr) -> c_int {
        unsafe { (self.bind)(fd, addr.as_ptr(), addr.len()) }
    }

    fn listen(&self, fd: c_int, backlog: c_int) -> c_int {
        unsafe { (self.listen)(fd, backlog) }
    }

    fn accept(&self, fd: c_int, addr: &mut RawSockAddr) -> c_int {
        let ptr = addr.as_mut_ptr();
        unsafe { (self.accept)(fd, ptr, addr.len_mut()) }
    }

    fn connect(&self, fd: c_int, addr: &RawSockAddr) -> c_int {
        unsafe { (self.connect)(fd, addr.as_ptr(), addr.len()) }
    }

    fn read(&self, fd: c_int, buf: &mut [u8]) -> isize {
        unsafe { (self.read)(fd, buf.as_mut_ptr() as *mut c_void, buf.len()) }
    }

    fn write(&self, fd: c_int, buf: &[u8]) -> isize {
        unsafe { (self.write)(fd, buf.as_ptr() as *const c_void, buf.len()) }
    }

    fn recv_from(&self, fd: c_int, buf: &mut [u8], addr: &mut RawSockAddr) -> isize {
        let ptr = addr.as_mut_ptr();
        unsafe {
            (self.recvfrom)(
                fd,
                buf.as_mut_ptr() as *mut c_void,
                buf.len(),
                0,
                ptr,
                addr.len_mut(),
            )
        }
    }

    fn send_to(&self, fd: c_int, buf: &[u8], addr: &RawSockAddr) -> isize {
        unsafe {
            (self.sendto)(
                fd,
                buf.as_ptr() as *const c_void,
                buf.len(),
                0,
                addr.as_ptr(),
                addr.len(),
            )
        }
    }

    fn shutdown(&self, fd: c_int, how: c_int) -> c_int {
        unsafe { (self.shutdown)(fd, how) }
    }

    fn close(&self, fd: c_int) -> c_int {
        unsafe { (self.close)(fd) }
    }
}
