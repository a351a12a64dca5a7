use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use CopyEverything::application::{
    normalize_root, Config, FilterSettings, Session, SettingsStore,
};
use CopyEverything::domain::{FilterMode, PatternSet};
use CopyEverything::infrastructure::{ErrorLogger, ErrorType, Logger, LoggerTrait};
use CopyEverything::presentation::{
    build_bundle, format_file_size, print_file_list, WalkSummary,
};

/// 过滤模式参数
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Include,
    Exclude,
}

impl From<ModeArg> for FilterMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Include => FilterMode::Include,
            ModeArg::Exclude => FilterMode::Exclude,
        }
    }
}

/// 列出目录中的文本文件，并把选中的文件拼接输出
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// 要浏览的目录路径
    #[clap(default_value = ".")]
    path: PathBuf,

    /// 过滤模式
    #[clap(long, value_enum)]
    mode: Option<ModeArg>,

    /// 包含模式，逗号分隔 (例如 "*.go,src/")
    #[clap(long)]
    include: Option<String>,

    /// 排除模式，逗号分隔 (例如 "vendor/,*.lock")
    #[clap(long)]
    exclude: Option<String>,

    /// 输出选中文件的拼接内容，而不是文件列表
    #[clap(long)]
    copy: bool,

    /// 选中的文件 (相对路径)，可多次指定
    #[clap(long = "select", value_name = "REL")]
    select: Vec<String>,

    /// 不使用并行遍历
    #[clap(long)]
    no_parallel: bool,

    /// 不读取根目录下的忽略文件
    #[clap(long)]
    no_ignore_file: bool,

    /// 配置文件路径，默认使用程序同级目录下的 config.toml
    #[clap(long)]
    config: Option<PathBuf>,

    /// 保存本次的过滤设置，下次打开同一目录时使用
    #[clap(long)]
    remember: bool,

    /// 清除其他目录保存的过滤设置
    #[clap(long)]
    forget_others: bool,

    /// 启用详细日志记录，日志文件将保存到当前目录
    #[clap(long)]
    log: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let root = if args.path.is_absolute() {
        normalize_root(&args.path)
    } else {
        normalize_root(
            &std::env::current_dir()
                .context("无法获取当前目录")?
                .join(&args.path),
        )
    };

    // 加载配置
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Config::default_config_path()?,
    };
    let mut config = Config::load_or_create(&config_path)?;
    config.validate()?;
    if args.no_parallel {
        config.walk.parallel = false;
    }
    if args.no_ignore_file {
        config.walk.respect_ignore_file = false;
    }

    // 初始化日志记录器
    let logger: Arc<dyn LoggerTrait> = Arc::new(Logger::new(args.log)?);
    let error_logger = Arc::new(ErrorLogger::new(args.log)?);

    // 命令行中的模式必须有效
    for pattern in [&args.include, &args.exclude].into_iter().flatten() {
        PatternSet::parse_strict(pattern)?;
    }

    let mut store = load_settings_store(&error_logger);
    let mut settings = match store.as_ref().and_then(|s| s.get(&root)) {
        Some(saved) => FilterSettings::from(saved),
        None => FilterSettings {
            mode: config.filter.default_mode,
            includes: config.filter.default_includes.clone(),
            excludes: config.filter.default_excludes.clone(),
        },
    };
    if let Some(mode) = args.mode {
        settings.mode = mode.into();
    }
    if let Some(includes) = &args.include {
        settings.includes = includes.trim().to_string();
    }
    if let Some(excludes) = &args.exclude {
        settings.excludes = excludes.trim().to_string();
    }

    if logger.is_enabled() {
        logger.log_message(&format!("根目录: {}", root.display()))?;
        logger.log_message(&format!("配置文件: {}", config_path.display()))?;
        logger.log_message(&format!("过滤模式: {}", settings.mode))?;
        logger.log_message(&format!("包含模式: {}", settings.includes))?;
        logger.log_message(&format!("排除模式: {}", settings.excludes))?;
        logger.log_message(&format!("并行遍历: {}", config.walk.parallel))?;
        logger.log_message(&format!("读取忽略文件: {}", config.walk.respect_ignore_file))?;
    }

    let session = Session::new(
        root.clone(),
        &config,
        settings,
        Arc::clone(&logger),
        Arc::clone(&error_logger),
        true,
    );

    let mut summary = WalkSummary::new(
        session.filter_settings().mode,
        session.current_pattern(),
    );

    session.start_walk()?;
    let stats = session.wait()?;

    let visible = session.visible_files();
    summary.stats = stats.clone();
    summary.visible_files = visible.len();

    for rel_path in &args.select {
        let rel_path = rel_path.replace('\\', "/");
        if !session.is_selected(&rel_path) {
            session.toggle_select(&rel_path)?;
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.copy {
        let selected = session.copy_targets();
        let bundle = build_bundle(&root, &selected, config.copy.max_file_size_bytes);
        out.write_all(bundle.content.as_bytes())?;
        out.flush()?;

        eprintln!(
            "已输出 {} 个文件，共 {}",
            bundle.files,
            format_file_size(bundle.bytes)
        );
        if bundle.oversized > 0 {
            eprintln!("跳过过大的文件: {}", bundle.oversized);
        }
        if bundle.read_errors > 0 {
            eprintln!("读取失败的文件: {}", bundle.read_errors);
        }
    } else {
        print_file_list(&mut out, &visible, |p| session.is_selected(p))?;
        out.flush()?;
        summary.print(&mut io::stderr())?;
    }

    if let Some(store) = store.as_mut().filter(|_| args.remember || args.forget_others) {
        let current = session.filter_settings();
        if args.forget_others {
            if let Err(err) = store.clear(&root) {
                let _ = error_logger.log_error(ErrorType::Settings, None, &format!("{:#}", err), None);
            }
        }
        if args.remember {
            store.update(&root, current.mode, &current.includes, &current.excludes);
        }
        if let Err(err) = store.save() {
            let _ = error_logger.log_error(
                ErrorType::Settings,
                Some(&store.path().display().to_string()),
                &format!("{:#}", err),
                None,
            );
        }
    }

    if logger.is_enabled() {
        logger.finalize(
            stats.files_seen,
            session.candidates().len() as u64,
            visible.len() as u64,
            summary.start_time.elapsed(),
        )?;
    }
    error_logger.finalize()?;
    error_logger.print_error_summary();

    Ok(())
}

/// 读取保存的过滤设置，无法确定位置时返回 None，文件损坏时使用空存储
fn load_settings_store(error_logger: &ErrorLogger) -> Option<SettingsStore> {
    let path = match SettingsStore::default_path() {
        Ok(path) => path,
        Err(err) => {
            let _ = error_logger.log_error(ErrorType::Settings, None, &format!("{:#}", err), None);
            return None;
        }
    };

    match SettingsStore::load(&path) {
        Ok(store) => Some(store),
        Err(err) => {
            let _ = error_logger.log_error(
                ErrorType::Settings,
                Some(&path.display().to_string()),
                &format!("{:#}", err),
                None,
            );
            Some(SettingsStore::empty(path))
        }
    }
}
