/*!
ztnet home目录

libzt在home目录中保存身份密钥和网络配置。临时目录在drop时删除。
*/

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// 临时home目录名前缀
pub const TEMP_HOME_PREFIX: &str = "zt-home-";

#[derive(Debug)]
enum Location {
    /// 仅当前进程可访问（0700），drop时删除
    Temporary(TempDir),
    Persistent(PathBuf),
}

/// libzt的home目录
#[derive(Debug)]
pub struct HomeDir {
    location: Location,
}

impl HomeDir {
    /// 在系统临时目录下创建新的`zt-home-<随机>`目录
    pub fn temporary() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(TEMP_HOME_PREFIX).tempdir()?;
        log::debug!("Created temporary home {}", dir.path().display());
        Ok(Self {
            location: Location::Temporary(dir),
        })
    }

    /// 使用已有目录，不存在时创建，drop时保留
    pub fn persistent<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;
        Ok(Self {
            location: Location::Persistent(path),
        })
    }

    pub fn path(&self) -> &Path {
        match &self.location {
            Location::Temporary(dir) => dir.path(),
            Location::Persistent(path) => path,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self.location, Location::Temporary(_))
    }
}

impl AsRef<Path> for HomeDir {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}
