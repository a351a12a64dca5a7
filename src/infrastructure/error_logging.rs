use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Local;

/// 错误类型分类
///
/// 这些错误都不会中断遍历，只会让结果集变小。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorType {
    /// 文件打开或读取失败
    FileRead,
    /// 目录无法访问（整棵子树被跳过）
    DirectoryAccess,
    /// 忽略文件解析失败
    IgnoreFile,
    /// 目录设置读写失败
    Settings,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::FileRead => "文件读取",
            ErrorType::DirectoryAccess => "目录访问",
            ErrorType::IgnoreFile => "忽略文件",
            ErrorType::Settings => "目录设置",
        }
    }
}

/// 错误日志记录器
///
/// 未启用时不写文件，但仍然统计错误次数。
pub struct ErrorLogger {
    error_file: Arc<Mutex<Option<File>>>,
    error_path: PathBuf,
    error_counts: Arc<Mutex<HashMap<ErrorType, usize>>>,
}

impl ErrorLogger {
    /// 创建新的错误日志记录器
    pub fn new(enabled: bool) -> Result<Self> {
        if !enabled {
            return Ok(Self {
                error_file: Arc::new(Mutex::new(None)),
                error_path: PathBuf::new(),
                error_counts: Arc::new(Mutex::new(HashMap::new())),
            });
        }
        Self::in_dir(Path::new("."))
    }

    /// 在指定目录下创建错误日志文件
    pub fn in_dir(dir: &Path) -> Result<Self> {
        let now = Local::now();
        let timestamp = now.format("%Y%m%d_%H%M%S");
        let error_path = dir.join(format!("error_{}.log", timestamp));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&error_path)?;

        let mut file_clone = file.try_clone()?;
        file_clone.write_all(&[0xEF, 0xBB, 0xBF])?; // UTF-8 BOM

        writeln!(file_clone, "# CopyEverything 错误日志")?;
        writeln!(file_clone, "# 开始时间: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(file_clone, "# ============================================")?;
        writeln!(file_clone)?;

        Ok(Self {
            error_file: Arc::new(Mutex::new(Some(file))),
            error_path,
            error_counts: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 记录错误
    pub fn log_error(
        &self,
        error_type: ErrorType,
        file_path: Option<&str>,
        message: &str,
        details: Option<&str>,
    ) -> Result<()> {
        if let Ok(mut counts) = self.error_counts.lock() {
            *counts.entry(error_type).or_insert(0) += 1;
        }

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        if let Ok(mut file_guard) = self.error_file.lock() {
            if let Some(ref mut file) = *file_guard {
                writeln!(file, "[{}] {} - {}", timestamp, error_type.as_str(), message)?;

                if let Some(path) = file_path {
                    writeln!(file, "  文件路径: {}", path)?;
                }

                if let Some(detail) = details {
                    writeln!(file, "  详细信息: {}", detail)?;
                }

                writeln!(file)?;
                file.flush()?;
            }
        }

        Ok(())
    }

    /// 获取错误统计信息
    pub fn get_error_summary(&self) -> HashMap<ErrorType, usize> {
        self.error_counts
            .lock()
            .map(|counts| counts.clone())
            .unwrap_or_default()
    }

    /// 某类错误的次数
    pub fn count(&self, error_type: ErrorType) -> usize {
        self.get_error_summary()
            .get(&error_type)
            .copied()
            .unwrap_or(0)
    }

    /// 获取总错误数
    pub fn get_total_errors(&self) -> usize {
        self.get_error_summary().values().sum()
    }

    /// 检查是否有错误
    pub fn has_errors(&self) -> bool {
        self.get_total_errors() > 0
    }

    fn sorted_summary(&self) -> Vec<(ErrorType, usize)> {
        let mut summary: Vec<_> = self.get_error_summary().into_iter().collect();
        summary.sort();
        summary
    }

    /// 完成错误日志记录
    pub fn finalize(&self) -> Result<()> {
        let summary = self.sorted_summary();

        if let Ok(mut file_guard) = self.error_file.lock() {
            if let Some(ref mut file) = *file_guard {
                let now = Local::now();
                writeln!(file, "# ============================================")?;
                writeln!(file, "# 结束时间: {}", now.format("%Y-%m-%d %H:%M:%S"))?;

                if summary.is_empty() {
                    writeln!(file, "# 无错误记录")?;
                } else {
                    writeln!(file, "# 错误统计:")?;
                    for (error_type, count) in &summary {
                        writeln!(file, "#   {}: {} 次", error_type.as_str(), count)?;
                    }
                    writeln!(file, "#   总计: {} 个错误", self.get_total_errors())?;
                }

                file.flush()?;
            }
        }

        Ok(())
    }

    /// 打印错误摘要到标准错误
    pub fn print_error_summary(&self) {
        if !self.has_errors() {
            return;
        }

        eprintln!("\n⚠️  扫描过程中跳过了部分内容:");
        eprintln!("----------------------------");

        for (error_type, count) in self.sorted_summary() {
            eprintln!("  {}: {} 次", error_type.as_str(), count);
        }

        eprintln!("  总计: {} 个错误", self.get_total_errors());
        if !self.error_path.as_os_str().is_empty() {
            eprintln!("  详细错误信息请查看: {}", self.error_path.display());
        }
    }
}
