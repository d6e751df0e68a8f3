//! 临时文件清理。

use std::fs;
use std::io;
use std::path::Path;

use crate::download::error::DownloadError;

/// 删除一个临时文件；文件本来就不存在时视为成功。
pub fn remove_temp_file(path: impl AsRef<Path>) -> Result<(), DownloadError> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DownloadError::TempFileCleanup(format!(
            "{}: {e}",
            path.display()
        ))),
    }
}
