// 分层结构：domain 为遍历与过滤核心，application 管理会话与配置
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

// 重新导出主要类型
pub use domain::{
    filter_files, DirectoryWalker, FilterEngine, FilterMode, IgnoreMatcher, PatternSet, WalkError,
};
pub use application::{Config, FilterSettings, Session, SettingsStore};
pub use infrastructure::{ErrorLogger, ErrorType, Logger, LoggerTrait};
pub use presentation::{build_bundle, Bundle, WalkSummary};
