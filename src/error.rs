/*!
ztnet错误模块

原生调用的失败统一折叠为带固定描述的错误，
其余错误（网络ID、库加载、地址族）在到达原生库之前产生。
*/

use std::io;
use std::os::raw::c_int;
use thiserror::Error;

/// 结果别名
pub type Result<T> = std::result::Result<T, ZtError>;

/// ztnet错误
#[derive(Error, Debug)]
pub enum ZtError {
    /// 原生调用返回失败
    #[error("{message}")]
    Failed { message: &'static str, code: c_int },

    #[error("invalid network id {0:?}: expected 16 hex digits")]
    InvalidNetworkId(String),

    #[error("invalid home path: {0}")]
    InvalidHomePath(String),

    #[error("unable to load libzt: {0}")]
    Library(String),

    #[error("invalid address family: expected {expected}, got {got}")]
    AddressFamily { expected: &'static str, got: &'static str },

    #[error("socket is closed")]
    Closed,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ZtError {
    pub(crate) fn failed(message: &'static str, code: c_int) -> Self {
        ZtError::Failed { message, code }
    }
}

/// 原生调用失败时的固定描述
pub mod messages {
    pub const SOCKET: &str = "Error in opening socket";
    pub const BIND: &str = "ERROR on binding";
    pub const LISTEN: &str = "ERROR listening";
    pub const CONNECT: &str = "Unable to connect";
    pub const ACCEPT: &str = "ERROR on accept";
    pub const READ: &str = "ERROR reading from socket";
    pub const WRITE: &str = "ERROR writing to socket";
    pub const RECV: &str = "ERROR receiving datagram";
    pub const SEND: &str = "ERROR sending datagram";
    pub const CLOSE: &str = "ERROR closing socket";
    pub const JOIN: &str = "Unable to join network";
}

impl From<ZtError> for io::Error {
    fn from(err: ZtError) -> Self {
        match err {
            ZtError::Io(e) => e,
            ZtError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// 检查返回值，负数视为失败
pub(crate) fn check(ret: c_int, message: &'static str) -> Result<c_int> {
    if ret < 0 {
        Err(ZtError::failed(message, ret))
    } else {
        Ok(ret)
    }
}

/// 检查读写类调用的返回值
pub(crate) fn check_len(ret: isize, message: &'static str) -> Result<usize> {
    if ret < 0 {
        Err(ZtError::failed(message, ret as c_int))
    } else {
        Ok(ret as usize)
    }
}
