use std::path::{Component, Path};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ignore::{DirEntry, WalkBuilder, WalkState};
use indicatif::{ProgressBar, ProgressStyle};

use super::classifier::{self, Classification};
use super::error::WalkError;
use super::ignore_matcher::{IgnoreMatcher, NoopIgnoreMatcher, DEFAULT_IGNORE_FILE};
use super::pattern::PatternSet;
use crate::infrastructure::{ErrorLogger, ErrorType, Logger, LoggerTrait};

/// 遍历选项
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// 使用所有CPU并行遍历
    pub parallel: bool,
    /// 是否跟随符号链接
    pub follow_links: bool,
    /// 根目录下忽略文件的名称，该文件本身不出现在结果中
    pub ignore_file_name: String,
    /// 显示进度动画
    pub show_progress: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            follow_links: false,
            ignore_file_name: DEFAULT_IGNORE_FILE.to_string(),
            show_progress: false,
        }
    }
}

/// 遍历统计
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    pub files_seen: u64,
    pub text_files: u64,
    pub binary_files: u64,
    pub unreadable_files: u64,
    pub pruned_dirs: u64,
    pub duration: Duration,
}

/// 一次遍历的结果：排好序的文本文件相对路径
#[derive(Debug, Clone, Default)]
pub struct WalkResult {
    pub files: Vec<String>,
    pub stats: WalkStats,
}

#[derive(Default)]
struct Counters {
    files_seen: AtomicU64,
    text_files: AtomicU64,
    binary_files: AtomicU64,
    unreadable_files: AtomicU64,
    pruned_dirs: AtomicU64,
}

/// 单次遍历目录树，生成候选文件列表
///
/// 内置排除目录和被忽略的目录在进入之前就被剪掉，整棵子树都不会访问。
pub struct DirectoryWalker {
    options: WalkOptions,
    builtin_excludes: Arc<PatternSet>,
    ignore_matcher: Arc<dyn IgnoreMatcher>,
    logger: Arc<dyn LoggerTrait>,
    error_logger: Arc<ErrorLogger>,
}

impl DirectoryWalker {
    pub fn new(
        options: WalkOptions,
        ignore_matcher: Arc<dyn IgnoreMatcher>,
        logger: Arc<dyn LoggerTrait>,
        error_logger: Arc<ErrorLogger>,
    ) -> Self {
        Self {
            options,
            builtin_excludes: Arc::new(PatternSet::builtin_excludes()),
            ignore_matcher,
            logger,
            error_logger,
        }
    }

    /// 不使用忽略规则、不记录日志的遍历器
    pub fn plain(options: WalkOptions) -> anyhow::Result<Self> {
        Ok(Self::new(
            options,
            Arc::new(NoopIgnoreMatcher),
            Arc::new(Logger::new(false)?),
            Arc::new(ErrorLogger::new(false)?),
        ))
    }

    /// 遍历 `root`，返回排好序的文本文件列表
    ///
    /// 只有根目录本身无法访问时才返回错误。
    pub fn walk(&self, root: &Path) -> Result<WalkResult, WalkError> {
        check_root(root)?;

        let start = Instant::now();
        let files = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());

        if self.logger.is_enabled() {
            let _ = self
                .logger
                .log_message(&format!("开始扫描目录: {}", root.display()));
        }

        let progress = if self.options.show_progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            progress.set_style(style);
        }
        progress.set_message("正在扫描...");

        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .follow_links(self.options.follow_links)
            .threads(if self.options.parallel {
                num_cpus::get()
            } else {
                1
            });

        // 目录剪枝
        {
            let root = root.to_path_buf();
            let builtin = Arc::clone(&self.builtin_excludes);
            let ignore_matcher = Arc::clone(&self.ignore_matcher);
            let logger = Arc::clone(&self.logger);
            let counters = Arc::clone(&counters);
            builder.filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().map_or(false, |ft| ft.is_dir()) {
                    return true;
                }
                let Some(rel_dir) = relative_path(&root, entry.path()) else {
                    return true;
                };
                match prune_reason(&rel_dir, &builtin, ignore_matcher.as_ref()) {
                    Some(reason) => {
                        counters.pruned_dirs.fetch_add(1, Ordering::Relaxed);
                        if logger.is_enabled() {
                            let _ = logger.log_file(entry.path(), reason);
                        }
                        false
                    }
                    None => true,
                }
            });
        }

        builder.build_parallel().run(|| {
            let root = root.to_path_buf();
            let files = Arc::clone(&files);
            let counters = Arc::clone(&counters);
            let logger = Arc::clone(&self.logger);
            let error_logger = Arc::clone(&self.error_logger);
            let ignore_file_name = self.options.ignore_file_name.clone();
            let progress = progress.clone();

            Box::new(move |result| {
                let entry = match result {
                    Ok(entry) => entry,
                    Err(err) => {
                        // 目录无法读取时其子树被跳过
                        let _ = error_logger.log_error(
                            ErrorType::DirectoryAccess,
                            None,
                            "遍历错误，已跳过",
                            Some(&err.to_string()),
                        );
                        return WalkState::Continue;
                    }
                };

                if !is_regular_file(&entry) {
                    return WalkState::Continue;
                }
                let Some(rel_path) = relative_path(&root, entry.path()) else {
                    return WalkState::Continue;
                };
                if rel_path == ignore_file_name {
                    return WalkState::Continue;
                }

                let seen = counters.files_seen.fetch_add(1, Ordering::Relaxed) + 1;
                if seen % 100 == 0 {
                    progress.set_message(format!("已扫描 {} 文件", seen));
                }

                match classifier::classify(entry.path()) {
                    Classification::Text => {
                        counters.text_files.fetch_add(1, Ordering::Relaxed);
                        if let Ok(mut files) = files.lock() {
                            files.push(rel_path);
                        }
                    }
                    Classification::Binary => {
                        counters.binary_files.fetch_add(1, Ordering::Relaxed);
                        if logger.is_enabled() {
                            let _ = logger.log_file(entry.path(), "已跳过(二进制)");
                        }
                    }
                    Classification::Unreadable { reason } => {
                        counters.unreadable_files.fetch_add(1, Ordering::Relaxed);
                        let _ = error_logger.log_error(
                            ErrorType::FileRead,
                            Some(&entry.path().to_string_lossy()),
                            "无法读取文件，已跳过",
                            Some(&reason),
                        );
                    }
                }

                WalkState::Continue
            })
        });

        let mut files = match Arc::try_unwrap(files) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()),
            Err(shared) => shared.lock().map(|files| files.clone()).unwrap_or_default(),
        };
        files.sort();

        let stats = WalkStats {
            files_seen: counters.files_seen.load(Ordering::Relaxed),
            text_files: counters.text_files.load(Ordering::Relaxed),
            binary_files: counters.binary_files.load(Ordering::Relaxed),
            unreadable_files: counters.unreadable_files.load(Ordering::Relaxed),
            pruned_dirs: counters.pruned_dirs.load(Ordering::Relaxed),
            duration: start.elapsed(),
        };

        progress.finish_with_message(format!("完成! 找到 {} 个文本文件", files.len()));

        if self.logger.is_enabled() {
            let _ = self.logger.log_message(&format!(
                "扫描完成: {} 文件, {} 文本, {} 二进制, {} 无法读取, {} 目录被剪枝",
                stats.files_seen,
                stats.text_files,
                stats.binary_files,
                stats.unreadable_files,
                stats.pruned_dirs
            ));
        }

        Ok(WalkResult { files, stats })
    }
}

/// 根目录必须存在、是目录并且可读
fn check_root(root: &Path) -> Result<(), WalkError> {
    let metadata = std::fs::metadata(root).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => WalkError::RootNotFound(root.to_path_buf()),
        _ => WalkError::RootUnreadable {
            path: root.to_path_buf(),
            source: err,
        },
    })?;
    if !metadata.is_dir() {
        return Err(WalkError::RootNotDirectory(root.to_path_buf()));
    }
    std::fs::read_dir(root).map_err(|source| WalkError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn prune_reason(
    rel_dir: &str,
    builtin: &PatternSet,
    ignore_matcher: &dyn IgnoreMatcher,
) -> Option<&'static str> {
    if builtin.matches_dir(rel_dir) {
        Some("已剪枝(内置排除)")
    } else if ignore_matcher.is_ignored(&format!("{}/", rel_dir)) {
        Some("已剪枝(忽略规则)")
    } else {
        None
    }
}

/// 普通文件，或指向普通文件的符号链接
fn is_regular_file(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        Some(ft) if ft.is_symlink() => {
            std::fs::metadata(entry.path()).map_or(false, |metadata| metadata.is_file())
        }
        _ => false,
    }
}

/// 转换为相对于根目录的正斜杠路径，根目录本身返回 None
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
