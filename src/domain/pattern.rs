use std::fmt;

use globset::{GlobBuilder, GlobMatcher};

use super::error::WalkError;

/// 内置排除规则，与过滤模式无关，始终生效
pub const BUILTIN_EXCLUDES: &str = ".git/,node_modules/,__pycache__/";

/// 单条过滤模式
#[derive(Debug, Clone)]
pub enum Pattern {
    /// 以 `/` 结尾：匹配该目录及其下所有内容
    Directory(String),
    /// 通配符：匹配文件名或完整相对路径
    Glob { source: String, matcher: GlobMatcher },
}

impl Pattern {
    /// 解析单条模式，调用方负责去除空白和空项
    pub fn parse(raw: &str) -> Result<Self, WalkError> {
        let normalized = raw.replace('\\', "/");
        if normalized.ends_with('/') {
            return Ok(Pattern::Directory(normalized));
        }

        // `*` 不跨越 `/`，与 shell 通配符一致
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .backslash_escape(false)
            .build()
            .map_err(|source| WalkError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })?;

        Ok(Pattern::Glob {
            source: normalized,
            matcher: glob.compile_matcher(),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Directory(dir) => dir,
            Pattern::Glob { source, .. } => source,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Pattern::Directory(_))
    }

    /// 检查相对路径是否匹配
    pub fn matches(&self, rel_path: &str) -> bool {
        let (dir, base) = split_path(rel_path);
        match self {
            Pattern::Directory(prefix) => format!("{}/", dir).starts_with(prefix.as_str()),
            Pattern::Glob { matcher, .. } => matcher.is_match(base) || matcher.is_match(rel_path),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 逗号分隔的模式集合，保持输入顺序
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
    invalid: Vec<String>,
}

impl PatternSet {
    /// 宽松解析：无效的通配符被丢弃（永不匹配），并记录在 [`PatternSet::invalid`] 中
    pub fn parse(input: &str) -> Self {
        let mut set = PatternSet::default();
        for raw in split_patterns(input) {
            match Pattern::parse(raw) {
                Ok(pattern) => set.patterns.push(pattern),
                Err(_) => set.invalid.push(raw.to_string()),
            }
        }
        set
    }

    /// 严格解析：遇到第一条无效模式即返回错误
    pub fn parse_strict(input: &str) -> Result<Self, WalkError> {
        let patterns = split_patterns(input)
            .map(Pattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            patterns,
            invalid: Vec::new(),
        })
    }

    /// 内置排除集合
    pub fn builtin_excludes() -> Self {
        Self::parse(BUILTIN_EXCLUDES)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    pub fn invalid(&self) -> &[String] {
        &self.invalid
    }

    /// 任意一条模式匹配即命中
    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(rel_path))
    }

    /// 目录剪枝检查：只看目录模式，`rel_dir` 不带结尾 `/`
    pub fn matches_dir(&self, rel_dir: &str) -> bool {
        let dir_path = format!("{}/", rel_dir);
        self.patterns.iter().any(|pattern| match pattern {
            Pattern::Directory(prefix) => dir_path.starts_with(prefix.as_str()),
            Pattern::Glob { .. } => false,
        })
    }
}

fn split_patterns(input: &str) -> impl Iterator<Item = &str> {
    input.split(',').map(str::trim).filter(|p| !p.is_empty())
}

/// 拆分为 (目录, 文件名)，根目录下的文件目录部分为空
fn split_path(rel_path: &str) -> (&str, &str) {
    rel_path.rsplit_once('/').unwrap_or(("", rel_path))
}
