pub mod classifier;
pub mod error;
pub mod file_walker;
pub mod filter;
pub mod ignore_matcher;
pub mod pattern;

pub use classifier::Classification;
pub use error::WalkError;
pub use file_walker::{DirectoryWalker, WalkOptions, WalkResult, WalkStats};
pub use filter::{filter_files, FilterEngine, FilterMode, Verdict};
pub use ignore_matcher::{
    load_ignore_matcher, GitignoreMatcher, IgnoreMatcher, NoopIgnoreMatcher, DEFAULT_IGNORE_FILE,
};
pub use pattern::{Pattern, PatternSet, BUILTIN_EXCLUDES};
