use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, Receiver};
use thiserror::Error;

use super::config::Config;
use super::settings::DirectorySettings;
use crate::domain::{
    load_ignore_matcher, DirectoryWalker, FilterEngine, FilterMode, IgnoreMatcher,
    NoopIgnoreMatcher, PatternSet, WalkStats,
};
use crate::infrastructure::{ErrorLogger, LoggerTrait};

/// 过滤设置：模式和两组模式字符串
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSettings {
    pub mode: FilterMode,
    pub includes: String,
    pub excludes: String,
}

impl From<&DirectorySettings> for FilterSettings {
    fn from(settings: &DirectorySettings) -> Self {
        Self {
            mode: settings.filter_mode,
            includes: settings.includes.clone(),
            excludes: settings.excludes.clone(),
        }
    }
}

/// 候选列表的加载状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// 后台遍历线程发出的事件
#[derive(Debug, Clone)]
pub enum WalkEvent {
    Finished(WalkStats),
    Failed(String),
}

/// 选择操作失败的原因
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("文件不在当前列表中: {0}")]
    NotVisible(String),
    #[error("最多只能选择 {0} 个文件")]
    LimitReached(usize),
}

struct CandidateState {
    load_state: LoadState,
    files: Vec<String>,
}

struct FilterState {
    settings: FilterSettings,
    visible: Vec<String>,
}

struct Shared {
    root: PathBuf,
    walker: DirectoryWalker,
    ignore_matcher: Arc<dyn IgnoreMatcher>,
    builtin_excludes: PatternSet,
    max_selected_files: usize,
    logger: Arc<dyn LoggerTrait>,
    // 加锁顺序固定为 candidates -> filter -> selection
    candidates: Mutex<CandidateState>,
    filter: Mutex<FilterState>,
    selection: Mutex<BTreeSet<String>>,
}

/// 一个根目录的浏览会话
///
/// 候选列表、过滤状态、选择状态各自独立加锁。
pub struct Session {
    shared: Arc<Shared>,
    events: Mutex<Option<Receiver<WalkEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        root: PathBuf,
        config: &Config,
        settings: FilterSettings,
        logger: Arc<dyn LoggerTrait>,
        error_logger: Arc<ErrorLogger>,
        show_progress: bool,
    ) -> Self {
        let ignore_matcher: Arc<dyn IgnoreMatcher> = if config.walk.respect_ignore_file {
            load_ignore_matcher(
                &root,
                &config.walk.ignore_file_name,
                logger.as_ref(),
                &error_logger,
            )
        } else {
            Arc::new(NoopIgnoreMatcher)
        };

        let walker = DirectoryWalker::new(
            config.walk_options(show_progress),
            Arc::clone(&ignore_matcher),
            Arc::clone(&logger),
            error_logger,
        );

        Self {
            shared: Arc::new(Shared {
                root,
                walker,
                ignore_matcher,
                builtin_excludes: PatternSet::builtin_excludes(),
                max_selected_files: config.copy.max_selected_files,
                logger,
                candidates: Mutex::new(CandidateState {
                    load_state: LoadState::Idle,
                    files: Vec::new(),
                }),
                filter: Mutex::new(FilterState {
                    settings,
                    visible: Vec::new(),
                }),
                selection: Mutex::new(BTreeSet::new()),
            }),
            events: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.shared.root
    }

    /// 在后台线程中遍历，完成后自动计算可见列表
    pub fn start_walk(&self) -> Result<()> {
        {
            let mut candidates = lock(&self.shared.candidates);
            if candidates.load_state == LoadState::Loading {
                return Err(anyhow!("目录正在扫描中"));
            }
            candidates.load_state = LoadState::Loading;
        }

        let (events_tx, events_rx) = bounded(1);
        *lock(&self.events) = Some(events_rx);

        let shared = Arc::clone(&self.shared);
        let handle = thread::spawn(move || {
            let event = match shared.walker.walk(&shared.root) {
                Ok(result) => {
                    // 可见列表算好之后才发布 Ready
                    let mut candidates = lock(&shared.candidates);
                    candidates.files = result.files;
                    shared.recompute_locked(&candidates);
                    candidates.load_state = LoadState::Ready;
                    drop(candidates);
                    WalkEvent::Finished(result.stats)
                }
                Err(err) => {
                    let message = err.to_string();
                    lock(&shared.candidates).load_state = LoadState::Failed(message.clone());
                    if shared.logger.is_enabled() {
                        let _ = shared.logger.log_message(&format!("扫描失败: {}", message));
                    }
                    WalkEvent::Failed(message)
                }
            };
            let _ = events_tx.send(event);
        });

        *lock(&self.worker) = Some(handle);
        Ok(())
    }

    /// 等待后台遍历结束
    pub fn wait(&self) -> Result<WalkStats> {
        let events = lock(&self.events)
            .clone()
            .ok_or_else(|| anyhow!("尚未开始扫描"))?;
        let event = events.recv().map_err(|_| anyhow!("扫描线程意外退出"))?;

        if let Some(handle) = lock(&self.worker).take() {
            let _ = handle.join();
        }

        match event {
            WalkEvent::Finished(stats) => Ok(stats),
            WalkEvent::Failed(message) => Err(anyhow!(message)),
        }
    }

    /// 非阻塞地取出已完成的遍历事件
    pub fn poll(&self) -> Option<WalkEvent> {
        lock(&self.events).as_ref()?.try_recv().ok()
    }

    pub fn load_state(&self) -> LoadState {
        lock(&self.shared.candidates).load_state.clone()
    }

    pub fn candidates(&self) -> Vec<String> {
        lock(&self.shared.candidates).files.clone()
    }

    pub fn filter_settings(&self) -> FilterSettings {
        lock(&self.shared.filter).settings.clone()
    }

    /// 当前可见列表的副本
    pub fn visible_files(&self) -> Vec<String> {
        lock(&self.shared.filter).visible.clone()
    }

    /// 当前模式对应的模式字符串
    pub fn current_pattern(&self) -> String {
        let filter = lock(&self.shared.filter);
        match filter.settings.mode {
            FilterMode::Exclude => filter.settings.excludes.clone(),
            FilterMode::Include => filter.settings.includes.clone(),
        }
    }

    /// 把模式字符串应用到当前模式，并重新计算
    pub fn apply_filter(&self, pattern: &str) {
        {
            let mut filter = lock(&self.shared.filter);
            let pattern = pattern.trim().to_string();
            match filter.settings.mode {
                FilterMode::Exclude => filter.settings.excludes = pattern,
                FilterMode::Include => filter.settings.includes = pattern,
            }
        }
        self.shared.recompute();
    }

    /// 切换过滤模式，并重新计算
    pub fn toggle_mode(&self) -> FilterMode {
        let mode = {
            let mut filter = lock(&self.shared.filter);
            filter.settings.mode = filter.settings.mode.toggle();
            filter.settings.mode
        };
        self.shared.recompute();
        mode
    }

    /// 整体替换过滤设置，并重新计算
    pub fn set_filter(&self, settings: FilterSettings) {
        lock(&self.shared.filter).settings = settings;
        self.shared.recompute();
    }

    /// 切换单个文件的选择状态，返回切换后是否被选中
    pub fn toggle_select(&self, rel_path: &str) -> Result<bool, SelectionError> {
        let filter = lock(&self.shared.filter);
        if filter.visible.binary_search_by(|p| p.as_str().cmp(rel_path)).is_err() {
            return Err(SelectionError::NotVisible(rel_path.to_string()));
        }

        let mut selection = lock(&self.shared.selection);
        if selection.remove(rel_path) {
            return Ok(false);
        }
        if selection.len() >= self.shared.max_selected_files {
            return Err(SelectionError::LimitReached(self.shared.max_selected_files));
        }
        selection.insert(rel_path.to_string());
        Ok(true)
    }

    /// 全部可见文件都已选中时清空选择，否则全选；返回操作后是否全选
    pub fn toggle_select_all(&self) -> Result<bool, SelectionError> {
        let filter = lock(&self.shared.filter);
        let mut selection = lock(&self.shared.selection);

        if filter.visible.is_empty() {
            return Ok(false);
        }

        let all_selected = filter.visible.iter().all(|p| selection.contains(p));
        if all_selected {
            selection.clear();
            return Ok(false);
        }

        if filter.visible.len() > self.shared.max_selected_files {
            return Err(SelectionError::LimitReached(self.shared.max_selected_files));
        }
        selection.extend(filter.visible.iter().cloned());
        Ok(true)
    }

    pub fn is_selected(&self, rel_path: &str) -> bool {
        lock(&self.shared.selection).contains(rel_path)
    }

    /// 要拼接的文件：没有选择时为全部可见文件，不受选择数量限制
    pub fn copy_targets(&self) -> Vec<String> {
        let filter = lock(&self.shared.filter);
        let selection = lock(&self.shared.selection);
        if selection.is_empty() {
            return filter.visible.clone();
        }
        filter
            .visible
            .iter()
            .filter(|p| selection.contains(*p))
            .cloned()
            .collect()
    }

    /// 已选中的文件，按可见列表的顺序
    pub fn selected_in_order(&self) -> Vec<String> {
        let filter = lock(&self.shared.filter);
        let selection = lock(&self.shared.selection);
        filter
            .visible
            .iter()
            .filter(|p| selection.contains(*p))
            .cloned()
            .collect()
    }
}

impl Shared {
    /// 重新计算可见列表，并丢弃不再可见的选择
    fn recompute(&self) {
        let candidates = lock(&self.candidates);
        self.recompute_locked(&candidates);
    }

    /// 调用方已持有候选列表的锁
    fn recompute_locked(&self, candidates: &CandidateState) {
        let mut filter = lock(&self.filter);

        let includes = PatternSet::parse(&filter.settings.includes);
        let excludes = PatternSet::parse(&filter.settings.excludes);
        for invalid in includes.invalid().iter().chain(excludes.invalid()) {
            if self.logger.is_enabled() {
                let _ = self
                    .logger
                    .log_message(&format!("无效的模式已忽略: {}", invalid));
            }
        }

        let engine = FilterEngine {
            mode: filter.settings.mode,
            includes: &includes,
            excludes: &excludes,
            builtin_excludes: &self.builtin_excludes,
            ignore_matcher: self.ignore_matcher.as_ref(),
        };
        filter.visible = engine.apply(&candidates.files);

        let mut selection = lock(&self.selection);
        selection.retain(|p| filter.visible.binary_search(p).is_ok());

        if self.logger.is_enabled() {
            let _ = self.logger.log_message(&format!(
                "过滤结果 ({}): {}/{} 可见, {} 已选",
                filter.settings.mode,
                filter.visible.len(),
                candidates.files.len(),
                selection.len()
            ));
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::Logger;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        write(dir.path(), "a/b.go", "package a\n");
        write(dir.path(), "a/c.txt", "notes\n");
        write(dir.path(), "a/sub/e.go", "package sub\n");
        write(dir.path(), "node_modules/d.go", "package d\n");
        write(dir.path(), ".git/HEAD", "ref: refs/heads/main\n");
        dir
    }

    fn session_with(root: &Path, config: &Config, settings: FilterSettings) -> Session {
        let session = Session::new(
            root.to_path_buf(),
            config,
            settings,
            Arc::new(Logger::new(false).unwrap()),
            Arc::new(ErrorLogger::new(false).unwrap()),
            false,
        );
        session.start_walk().unwrap();
        session.wait().unwrap();
        session
    }

    fn session(root: &Path) -> Session {
        session_with(root, &Config::default(), FilterSettings::default())
    }

    #[test]
    fn test_walk_then_default_filter() {
        let dir = fixture();
        let session = session(dir.path());

        assert_eq!(session.load_state(), LoadState::Ready);
        assert_eq!(session.candidates(), vec!["a/b.go", "a/c.txt", "a/sub/e.go"]);
        assert_eq!(session.visible_files(), vec!["a/b.go", "a/c.txt", "a/sub/e.go"]);
    }

    #[test]
    fn test_ignore_file_is_respected() {
        let dir = fixture();
        write(dir.path(), ".gitignore", "a/c.txt\n");
        let session = session(dir.path());
        assert_eq!(session.visible_files(), vec!["a/b.go", "a/sub/e.go"]);

        let mut config = Config::default();
        config.walk.respect_ignore_file = false;
        let session = session_with(dir.path(), &config, FilterSettings::default());
        assert_eq!(session.visible_files(), vec!["a/b.go", "a/c.txt", "a/sub/e.go"]);
    }

    #[test]
    fn test_apply_filter_and_toggle_mode() {
        let dir = fixture();
        let session = session(dir.path());

        session.apply_filter(" a/ ");
        assert_eq!(session.filter_settings().excludes, "a/");
        assert!(session.visible_files().is_empty());

        assert_eq!(session.toggle_mode(), FilterMode::Include);
        // 包含规则为空时显示全部
        assert_eq!(session.visible_files().len(), 3);

        session.apply_filter("*.go");
        assert_eq!(session.current_pattern(), "*.go");
        assert_eq!(session.visible_files(), vec!["a/b.go", "a/sub/e.go"]);
        assert_eq!(session.filter_settings().excludes, "a/");
    }

    #[test]
    fn test_initial_settings_are_used() {
        let dir = fixture();
        let settings = FilterSettings {
            mode: FilterMode::Include,
            includes: "*.txt".to_string(),
            excludes: String::new(),
        };
        let session = session_with(dir.path(), &Config::default(), settings);
        assert_eq!(session.visible_files(), vec!["a/c.txt"]);
    }

    #[test]
    fn test_selection_survives_only_while_visible() {
        let dir = fixture();
        let session = session(dir.path());

        assert_eq!(session.toggle_select("a/b.go"), Ok(true));
        assert_eq!(session.toggle_select("a/c.txt"), Ok(true));
        assert_eq!(
            session.toggle_select("node_modules/d.go"),
            Err(SelectionError::NotVisible("node_modules/d.go".to_string()))
        );
        assert_eq!(session.selected_in_order(), vec!["a/b.go", "a/c.txt"]);

        session.apply_filter("*.txt");
        assert_eq!(session.selected_in_order(), vec!["a/b.go"]);

        session.apply_filter("");
        assert!(!session.is_selected("a/c.txt"));
        assert_eq!(session.toggle_select("a/b.go"), Ok(false));
        assert!(session.selected_in_order().is_empty());
    }

    #[test]
    fn test_select_all_toggles() {
        let dir = fixture();
        let session = session(dir.path());

        assert_eq!(session.toggle_select_all(), Ok(true));
        assert_eq!(session.selected_in_order().len(), 3);
        assert_eq!(session.toggle_select_all(), Ok(false));
        assert!(session.selected_in_order().is_empty());
    }

    #[test]
    fn test_selection_limit() {
        let dir = fixture();
        let mut config = Config::default();
        config.copy.max_selected_files = 2;
        let session = session_with(dir.path(), &config, FilterSettings::default());

        assert_eq!(session.toggle_select_all(), Err(SelectionError::LimitReached(2)));
        session.toggle_select("a/b.go").unwrap();
        session.toggle_select("a/c.txt").unwrap();
        assert_eq!(
            session.toggle_select("a/sub/e.go"),
            Err(SelectionError::LimitReached(2))
        );
    }

    #[test]
    fn test_copy_targets_without_selection_ignore_limit() {
        let dir = tempdir().unwrap();
        for i in 0..51 {
            write(dir.path(), &format!("f{:02}.txt", i), "x\n");
        }
        let session = session(dir.path());
        assert_eq!(Config::default().copy.max_selected_files, 50);

        let targets = session.copy_targets();
        assert_eq!(targets.len(), 51);
        assert_eq!(targets.first().map(String::as_str), Some("f00.txt"));
        assert!(session.selected_in_order().is_empty());

        session.toggle_select("f07.txt").unwrap();
        session.toggle_select("f03.txt").unwrap();
        assert_eq!(session.copy_targets(), vec!["f03.txt", "f07.txt"]);
    }

    #[test]
    fn test_ready_implies_visible_list() {
        let dir = fixture();
        let session = Session::new(
            dir.path().to_path_buf(),
            &Config::default(),
            FilterSettings::default(),
            Arc::new(Logger::new(false).unwrap()),
            Arc::new(ErrorLogger::new(false).unwrap()),
            false,
        );
        session.start_walk().unwrap();

        loop {
            if session.load_state() == LoadState::Ready {
                assert_eq!(session.visible_files().len(), 3);
                break;
            }
            std::thread::yield_now();
        }
        session.wait().unwrap();
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempdir().unwrap();
        let session = Session::new(
            dir.path().join("missing"),
            &Config::default(),
            FilterSettings::default(),
            Arc::new(Logger::new(false).unwrap()),
            Arc::new(ErrorLogger::new(false).unwrap()),
            false,
        );
        session.start_walk().unwrap();

        assert!(session.wait().is_err());
        assert!(matches!(session.load_state(), LoadState::Failed(_)));
        assert!(session.visible_files().is_empty());
    }

    #[test]
    fn test_poll_after_walk() {
        let dir = fixture();
        let session = Session::new(
            dir.path().to_path_buf(),
            &Config::default(),
            FilterSettings::default(),
            Arc::new(Logger::new(false).unwrap()),
            Arc::new(ErrorLogger::new(false).unwrap()),
            false,
        );
        assert_eq!(session.load_state(), LoadState::Idle);
        assert!(session.poll().is_none());

        session.start_walk().unwrap();
        let events = lock(&session.events).clone().unwrap();
        let event = events.recv().unwrap();
        assert!(matches!(event, WalkEvent::Finished(ref stats) if stats.text_files == 3));
        assert_eq!(session.load_state(), LoadState::Ready);
    }
}
