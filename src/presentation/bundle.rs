use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use super::display::format_file_size;

const BANNER: &str = "==========================";

/// 拼接后的内容以及统计
#[derive(Debug, Default)]
pub struct Bundle {
    pub content: String,
    pub files: usize,
    pub bytes: u64,
    pub read_errors: usize,
    pub oversized: usize,
}

/// 按顺序拼接选中文件的内容
///
/// 每个文件前有一段带相对路径的分隔标题；读取失败或超过大小限制的文件
/// 只输出一行提示，不会中断拼接。
pub fn build_bundle(root: &Path, rel_paths: &[String], max_file_size: u64) -> Bundle {
    let mut bundle = Bundle::default();

    for rel_path in rel_paths {
        let full_path = root.join(rel_path);
        let _ = write!(bundle.content, "{}\nFILE: {}\n{}\n", BANNER, rel_path, BANNER);
        bundle.files += 1;

        let size = fs::metadata(&full_path).map(|m| m.len()).unwrap_or(0);
        if size > max_file_size {
            bundle.oversized += 1;
            let _ = write!(
                bundle.content,
                "\n!!! FILE TOO LARGE: {} (limit {}) !!!\n\n",
                format_file_size(size),
                format_file_size(max_file_size)
            );
            continue;
        }

        match fs::read(&full_path) {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                bundle.bytes += bytes.len() as u64;
                bundle.content.push('\n');
                bundle.content.push_str(&text);
                if !text.ends_with('\n') {
                    bundle.content.push('\n');
                }
                bundle.content.push('\n');
            }
            Err(err) => {
                bundle.read_errors += 1;
                let _ = write!(bundle.content, "\n!!! ERROR READING FILE: {} !!!\n\n", err);
            }
        }
    }

    bundle
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_bundle_format() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("a/b.go"), "package a\n").unwrap();
        fs::write(dir.path().join("c.txt"), "no newline").unwrap();

        let files = vec!["a/b.go".to_string(), "c.txt".to_string()];
        let bundle = build_bundle(dir.path(), &files, 1024);

        let expected = "==========================\nFILE: a/b.go\n==========================\n\
                        \npackage a\n\n\
                        ==========================\nFILE: c.txt\n==========================\n\
                        \nno newline\n\n";
        assert_eq!(bundle.content, expected);
        assert_eq!(bundle.files, 2);
        assert_eq!(bundle.bytes, 20);
        assert_eq!(bundle.read_errors, 0);
    }

    #[test]
    fn test_missing_file_is_reported_inline() {
        let dir = tempdir().unwrap();
        let files = vec!["gone.txt".to_string()];
        let bundle = build_bundle(dir.path(), &files, 1024);

        assert_eq!(bundle.read_errors, 1);
        assert!(bundle.content.starts_with("==========================\nFILE: gone.txt\n"));
        assert!(bundle.content.contains("!!! ERROR READING FILE:"));
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(64)).unwrap();
        let bundle = build_bundle(dir.path(), &["big.txt".to_string()], 10);

        assert_eq!(bundle.oversized, 1);
        assert_eq!(bundle.bytes, 0);
        assert!(bundle.content.contains("!!! FILE TOO LARGE: 64 B (limit 10 B) !!!"));
        assert!(!bundle.content.contains("xxxx"));
    }
}
