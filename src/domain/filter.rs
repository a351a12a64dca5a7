use std::fmt;

use serde::{Deserialize, Serialize};

use super::ignore_matcher::IgnoreMatcher;
use super::pattern::PatternSet;

/// 过滤模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// 排除匹配的文件（默认）
    #[default]
    Exclude,
    /// 只保留匹配的文件
    Include,
}

impl FilterMode {
    pub fn toggle(self) -> Self {
        match self {
            FilterMode::Exclude => FilterMode::Include,
            FilterMode::Include => FilterMode::Exclude,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::Exclude => f.write_str("exclude"),
            FilterMode::Include => f.write_str("include"),
        }
    }
}

/// 单个路径的过滤结论，按优先级从高到低
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 被忽略文件规则排除
    Ignored,
    /// 被内置排除规则排除
    BuiltinExcluded,
    /// 排除模式下命中用户排除规则
    Excluded,
    /// 包含模式下没有命中任何包含规则
    NotIncluded,
    Visible,
}

/// 一次过滤所需的全部输入
///
/// 纯数据，不持有锁；相同输入总是得到相同输出。
pub struct FilterEngine<'a> {
    pub mode: FilterMode,
    pub includes: &'a PatternSet,
    pub excludes: &'a PatternSet,
    pub builtin_excludes: &'a PatternSet,
    pub ignore_matcher: &'a dyn IgnoreMatcher,
}

impl<'a> FilterEngine<'a> {
    /// 判定路径的可见性
    ///
    /// 忽略规则和内置排除是无条件否决，包含规则无法覆盖它们。
    pub fn verdict(&self, rel_path: &str) -> Verdict {
        if self.ignore_matcher.is_ignored(rel_path) {
            return Verdict::Ignored;
        }
        if self.builtin_excludes.matches(rel_path) {
            return Verdict::BuiltinExcluded;
        }

        match self.mode {
            FilterMode::Exclude if self.excludes.matches(rel_path) => Verdict::Excluded,
            FilterMode::Exclude => Verdict::Visible,
            FilterMode::Include if self.includes.is_empty() || self.includes.matches(rel_path) => {
                Verdict::Visible
            }
            FilterMode::Include => Verdict::NotIncluded,
        }
    }

    pub fn is_visible(&self, rel_path: &str) -> bool {
        self.verdict(rel_path) == Verdict::Visible
    }

    /// 从候选列表得到可见列表，保持候选列表的顺序
    pub fn apply(&self, candidates: &[String]) -> Vec<String> {
        candidates
            .iter()
            .filter(|path| self.is_visible(path))
            .cloned()
            .collect()
    }
}

/// 根据模式字符串直接过滤
pub fn filter_files(
    candidates: &[String],
    mode: FilterMode,
    includes: &str,
    excludes: &str,
    ignore_matcher: &dyn IgnoreMatcher,
) -> Vec<String> {
    let includes = PatternSet::parse(includes);
    let excludes = PatternSet::parse(excludes);
    let builtin_excludes = PatternSet::builtin_excludes();

    FilterEngine {
        mode,
        includes: &includes,
        excludes: &excludes,
        builtin_excludes: &builtin_excludes,
        ignore_matcher,
    }
    .apply(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ignore_matcher::{GitignoreMatcher, NoopIgnoreMatcher};
    use std::path::Path;

    fn candidates(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn scenario() -> Vec<String> {
        candidates(&["a/b.go", "a/c.txt", "node_modules/d.go", ".git/HEAD"])
    }

    #[test]
    fn test_exclude_mode_defaults() {
        let visible = filter_files(&scenario(), FilterMode::Exclude, "", "", &NoopIgnoreMatcher);
        assert_eq!(visible, vec!["a/b.go", "a/c.txt"]);
    }

    #[test]
    fn test_include_cannot_override_builtin() {
        let visible = filter_files(
            &scenario(),
            FilterMode::Include,
            "*.go",
            "",
            &NoopIgnoreMatcher,
        );
        assert_eq!(visible, vec!["a/b.go"]);

        let visible = filter_files(
            &scenario(),
            FilterMode::Include,
            "node_modules/,.git/",
            "",
            &NoopIgnoreMatcher,
        );
        assert!(visible.is_empty());
    }

    #[test]
    fn test_include_mode_with_empty_includes_shows_everything() {
        let visible = filter_files(&scenario(), FilterMode::Include, " , ", "", &NoopIgnoreMatcher);
        assert_eq!(visible, vec!["a/b.go", "a/c.txt"]);
    }

    #[test]
    fn test_ignore_file_vetoes() {
        let ignore = GitignoreMatcher::from_lines(Path::new("/project"), ["a/c.txt"]).unwrap();
        let visible = filter_files(&scenario(), FilterMode::Exclude, "", "", &ignore);
        assert_eq!(visible, vec!["a/b.go"]);

        let visible = filter_files(&scenario(), FilterMode::Include, "*.txt", "", &ignore);
        assert!(visible.is_empty());
    }

    #[test]
    fn test_exclude_directory_pattern_covers_nested_paths() {
        let files = candidates(&["a/b.go", "a/sub/e.go", "b/a/f.go", "main.go"]);
        let visible = filter_files(&files, FilterMode::Exclude, "", "a/", &NoopIgnoreMatcher);
        assert_eq!(visible, vec!["b/a/f.go", "main.go"]);
    }

    #[test]
    fn test_exclude_root_files() {
        let files = candidates(&["README.md", "src/lib.rs"]);
        let visible = filter_files(&files, FilterMode::Exclude, "", "/", &NoopIgnoreMatcher);
        assert_eq!(visible, vec!["src/lib.rs"]);
    }

    #[test]
    fn test_mode_selects_pattern_string() {
        let files = candidates(&["a.go", "b.rs"]);
        // 排除模式下包含规则不起作用，反之亦然
        let visible = filter_files(&files, FilterMode::Exclude, "*.go", "", &NoopIgnoreMatcher);
        assert_eq!(visible, files);
        let visible = filter_files(&files, FilterMode::Include, "", "*.go", &NoopIgnoreMatcher);
        assert_eq!(visible, files);
    }

    #[test]
    fn test_verdict_precedence() {
        let ignore = GitignoreMatcher::from_lines(Path::new("/project"), ["*.go"]).unwrap();
        let includes = PatternSet::parse("*.go,*.md");
        let excludes = PatternSet::parse("docs/");
        let builtin = PatternSet::builtin_excludes();

        let include_engine = FilterEngine {
            mode: FilterMode::Include,
            includes: &includes,
            excludes: &excludes,
            builtin_excludes: &builtin,
            ignore_matcher: &ignore,
        };
        assert_eq!(include_engine.verdict("node_modules/x.go"), Verdict::Ignored);
        assert_eq!(include_engine.verdict("node_modules/x.md"), Verdict::BuiltinExcluded);
        assert_eq!(include_engine.verdict("docs/x.md"), Verdict::Visible);
        assert_eq!(include_engine.verdict("x.txt"), Verdict::NotIncluded);

        let exclude_engine = FilterEngine {
            mode: FilterMode::Exclude,
            ..include_engine
        };
        assert_eq!(exclude_engine.verdict("docs/x.md"), Verdict::Excluded);
        assert_eq!(exclude_engine.verdict("x.txt"), Verdict::Visible);
    }

    #[test]
    fn test_deterministic() {
        let files = candidates(&["c.rs", "a/b.rs", "a/c.go", "z.md"]);
        let first = filter_files(&files, FilterMode::Include, "*.rs,z.md", "", &NoopIgnoreMatcher);
        let second = filter_files(&files, FilterMode::Include, "*.rs,z.md", "", &NoopIgnoreMatcher);
        assert_eq!(first, second);
        assert_eq!(first, vec!["c.rs", "a/b.rs", "z.md"]);
    }

    #[test]
    fn test_mode_toggle() {
        assert_eq!(FilterMode::default(), FilterMode::Exclude);
        assert_eq!(FilterMode::Exclude.toggle(), FilterMode::Include);
        assert_eq!(FilterMode::Include.toggle().to_string(), "exclude");
    }
}
