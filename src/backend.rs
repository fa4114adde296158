/*!
ztnet后端接口

libzt的每个C函数对应一个方法，返回值保持C语义（负数表示失败），
由上层统一转换为错误。
*/

use std::ffi::CStr;
use std::os::raw::c_int;

use crate::protocol::AddressFamily;
use crate::sockaddr::RawSockAddr;

/// libzt调用接口
pub trait Backend: Send + Sync {
    /// 启动服务并加入网络，成功返回0
    fn start(&self, home_path: &CStr, network_id: &CStr) -> c_int;

    /// 将分配给本节点的地址写入`buf`
    fn get_address(&self, network_id: &CStr, family: AddressFamily, buf: &mut [u8]) -> c_int;

    /// 创建虚拟套接字，返回描述符
    fn socket(&self, family: c_int, socket_type: c_int, protocol: c_int) -> c_int;

    fn bind(&self, fd: c_int, addr: &RawSockAddr) -> c_int;

    fn listen(&self, fd: c_int, backlog: c_int) -> c_int;

    /// 接受连接，对端地址写入`addr`
    fn accept(&self, fd: c_int, addr: &mut RawSockAddr) -> c_int;

    fn connect(&self, fd: c_int, addr: &RawSockAddr) -> c_int;

    fn read(&self, fd: c_int, buf: &mut [u8]) -> isize;

    fn write(&self, fd: c_int, buf: &[u8]) -> isize;

    /// 接收数据报，来源地址写入`addr`
    fn recv_from(&self, fd: c_int, buf: &mut [u8], addr: &mut RawSockAddr) -> isize;

    fn send_to(&self, fd: c_int, buf: &[u8], addr: &RawSockAddr) -> isize;

    fn shutdown(&self, fd: c_int, how: c_int) -> c_int;

    fn close(&self, fd: c_int) -> c_int;
}
