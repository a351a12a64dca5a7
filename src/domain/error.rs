use std::path::PathBuf;

use thiserror::Error;

/// 遍历过程中的致命错误
///
/// 目录权限错误、单个文件读取失败、忽略文件解析失败都不会出现在这里，
/// 它们只会让结果集变小。
#[derive(Debug, Error)]
pub enum WalkError {
    /// 根目录不存在
    #[error("目录不存在: {}", .0.display())]
    RootNotFound(PathBuf),

    /// 根路径不是目录
    #[error("路径不是目录: {}", .0.display())]
    RootNotDirectory(PathBuf),

    /// 根目录无法访问
    #[error("无法访问目录 {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 无效的通配符模式
    #[error("无效的模式 '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
