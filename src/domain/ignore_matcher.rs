use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::infrastructure::{ErrorLogger, ErrorType, LoggerTrait};

/// 默认的忽略文件名
pub const DEFAULT_IGNORE_FILE: &str = ".gitignore";

/// 忽略规则判断能力
///
/// 路径为相对于扫描根目录的正斜杠路径，以 `/` 结尾表示目录。
pub trait IgnoreMatcher: Send + Sync {
    fn is_ignored(&self, rel_path: &str) -> bool;
}

/// 没有忽略文件时使用的空实现
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopIgnoreMatcher;

impl IgnoreMatcher for NoopIgnoreMatcher {
    fn is_ignored(&self, _rel_path: &str) -> bool {
        false
    }
}

/// 基于根目录下 .gitignore 的匹配器
#[derive(Debug)]
pub struct GitignoreMatcher {
    gitignore: Gitignore,
}

impl GitignoreMatcher {
    /// 解析 `root/file_name`
    ///
    /// 文件不存在或者是目录时返回 `Ok(None)`。
    pub fn load(root: &Path, file_name: &str) -> Result<Option<Self>, ignore::Error> {
        let path = root.join(file_name);
        match std::fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => return Ok(None),
            Ok(_) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ignore::Error::WithPath {
                    path: path.clone(),
                    err: Box::new(ignore::Error::Io(err)),
                })
            }
        }

        let mut builder = GitignoreBuilder::new(root);
        if let Some(err) = builder.add(&path) {
            return Err(err);
        }
        let gitignore = builder.build()?;

        Ok(Some(Self { gitignore }))
    }

    /// 由规则文本直接构建
    pub fn from_lines<'a>(
        root: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        for line in lines {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            gitignore: builder.build()?,
        })
    }

    pub fn num_rules(&self) -> usize {
        self.gitignore.num_ignores() as usize
    }
}

impl IgnoreMatcher for GitignoreMatcher {
    fn is_ignored(&self, rel_path: &str) -> bool {
        let is_dir = rel_path.ends_with('/');
        let trimmed = rel_path.trim_end_matches('/');
        if trimmed.is_empty() {
            return false;
        }
        self.gitignore
            .matched_path_or_any_parents(Path::new(trimmed), is_dir)
            .is_ignore()
    }
}

/// 加载忽略规则，任何失败都退回到空实现
pub fn load_ignore_matcher(
    root: &Path,
    file_name: &str,
    logger: &dyn LoggerTrait,
    error_logger: &ErrorLogger,
) -> Arc<dyn IgnoreMatcher> {
    let ignore_path: PathBuf = root.join(file_name);
    match GitignoreMatcher::load(root, file_name) {
        Ok(Some(matcher)) => {
            if logger.is_enabled() {
                let _ = logger.log_message(&format!(
                    "已加载忽略文件 {} ({} 条规则)",
                    ignore_path.display(),
                    matcher.num_rules()
                ));
            }
            Arc::new(matcher)
        }
        Ok(None) => {
            if logger.is_enabled() {
                let _ = logger.log_message(&format!("未找到忽略文件: {}", ignore_path.display()));
            }
            Arc::new(NoopIgnoreMatcher)
        }
        Err(err) => {
            let _ = error_logger.log_error(
                ErrorType::IgnoreFile,
                Some(&ignore_path.to_string_lossy()),
                "解析忽略文件失败，不使用忽略规则",
                Some(&err.to_string()),
            );
            Arc::new(NoopIgnoreMatcher)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::Logger;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_noop_matcher() {
        let matcher = NoopIgnoreMatcher;
        assert!(!matcher.is_ignored("a/c.txt"));
        assert!(!matcher.is_ignored("build/"));
    }

    #[test]
    fn test_file_and_directory_rules() {
        let dir = tempdir().unwrap();
        let matcher =
            GitignoreMatcher::from_lines(dir.path(), ["a/c.txt", "build/", "*.log"]).unwrap();

        assert!(matcher.is_ignored("a/c.txt"));
        assert!(!matcher.is_ignored("a/b.go"));
        assert!(matcher.is_ignored("build/"));
        assert!(matcher.is_ignored("build/out.txt"));
        assert!(matcher.is_ignored("nested/debug.log"));
        // 目录规则不匹配同名文件
        assert!(!matcher.is_ignored("build"));
    }

    #[test]
    fn test_negation() {
        let dir = tempdir().unwrap();
        let matcher = GitignoreMatcher::from_lines(dir.path(), ["*.txt", "!keep.txt"]).unwrap();
        assert!(matcher.is_ignored("drop.txt"));
        assert!(!matcher.is_ignored("keep.txt"));
    }

    #[test]
    fn test_load_missing_or_directory() {
        let dir = tempdir().unwrap();
        assert!(GitignoreMatcher::load(dir.path(), ".gitignore").unwrap().is_none());

        fs::create_dir(dir.path().join(".gitignore")).unwrap();
        assert!(GitignoreMatcher::load(dir.path(), ".gitignore").unwrap().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "# comment\n\ntarget/\nsecret.env\n").unwrap();

        let matcher = GitignoreMatcher::load(dir.path(), ".gitignore")
            .unwrap()
            .unwrap();
        assert_eq!(matcher.num_rules(), 2);
        assert!(matcher.is_ignored("target/"));
        assert!(matcher.is_ignored("secret.env"));
        assert!(!matcher.is_ignored("src/main.rs"));
    }

    #[test]
    fn test_load_ignore_matcher_falls_back() {
        let dir = tempdir().unwrap();
        let logger = Logger::new(false).unwrap();
        let error_logger = ErrorLogger::new(false).unwrap();

        let matcher = load_ignore_matcher(dir.path(), ".gitignore", &logger, &error_logger);
        assert!(!matcher.is_ignored("anything.txt"));

        fs::write(dir.path().join(".gitignore"), "*.tmp\n").unwrap();
        let matcher = load_ignore_matcher(dir.path(), ".gitignore", &logger, &error_logger);
        assert!(matcher.is_ignored("x.tmp"));
    }

    #[cfg(unix)]
    #[test]
    fn test_metadata_error_carries_path() {
        let dir = tempdir().unwrap();
        let not_a_dir = dir.path().join("plain.txt");
        fs::write(&not_a_dir, "x").unwrap();

        // 父路径是文件，得到 NotADirectory 而不是 NotFound
        let err = GitignoreMatcher::load(&not_a_dir, ".gitignore").unwrap_err();
        assert!(matches!(err, ignore::Error::WithPath { .. }));
        assert!(err.to_string().contains("plain.txt"));
    }

    #[test]
    fn test_invalid_rule_falls_back_to_noop() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.tmp\na[\n").unwrap();
        let logger = Logger::new(false).unwrap();
        let error_logger = ErrorLogger::new(false).unwrap();

        assert!(GitignoreMatcher::load(dir.path(), ".gitignore").is_err());

        let matcher = load_ignore_matcher(dir.path(), ".gitignore", &logger, &error_logger);
        assert!(!matcher.is_ignored("x.tmp"));
        assert!(!matcher.is_ignored("a["));
        assert_eq!(error_logger.count(ErrorType::IgnoreFile), 1);
    }
}
