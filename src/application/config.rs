use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{FilterMode, PatternSet, WalkOptions, DEFAULT_IGNORE_FILE};

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// 遍历相关配置
    pub walk: WalkConfig,
    /// 默认过滤规则
    pub filter: FilterConfig,
    /// 复制相关配置
    pub copy: CopyConfig,
}

/// 遍历配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    /// 是否并行遍历
    pub parallel: bool,
    /// 是否遵循根目录下的忽略文件
    pub respect_ignore_file: bool,
    /// 忽略文件名
    pub ignore_file_name: String,
    /// 是否跟随符号链接
    pub follow_links: bool,
}

/// 过滤配置，没有保存过目录设置时使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub default_mode: FilterMode,
    pub default_includes: String,
    pub default_excludes: String,
}

/// 复制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// 最多可选择的文件数
    pub max_selected_files: usize,
    /// 超过该大小的文件只输出提示，不输出内容
    pub max_file_size_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            walk: WalkConfig {
                parallel: true,
                respect_ignore_file: true,
                ignore_file_name: DEFAULT_IGNORE_FILE.to_string(),
                follow_links: false,
            },
            filter: FilterConfig {
                default_mode: FilterMode::Exclude,
                default_includes: String::new(),
                default_excludes: String::new(),
            },
            copy: CopyConfig {
                max_selected_files: 50,
                max_file_size_bytes: 100 * 1024,
            },
        }
    }
}

impl Config {
    /// 从配置文件加载配置，如果文件不存在则创建默认配置文件
    pub fn load_or_create(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::load_from_file(config_path)
        } else {
            let config = Self::default();
            config.save_to_file(config_path)?;
            eprintln!("已创建默认配置文件: {}", config_path.display());
            Ok(config)
        }
    }

    /// 从文件加载配置
    pub fn load_from_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("无法读取配置文件: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("无法解析配置文件: {}", config_path.display()))?;

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建配置目录: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("无法序列化配置")?;

        fs::write(config_path, content)
            .with_context(|| format!("无法写入配置文件: {}", config_path.display()))?;

        Ok(())
    }

    /// 获取配置文件的默认路径
    pub fn default_config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("无法获取程序路径")?;

        let exe_dir = exe_path.parent().context("无法获取程序目录")?;

        Ok(exe_dir.join("config.toml"))
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<()> {
        let name = &self.walk.ignore_file_name;
        if name.trim().is_empty() || name.contains('/') || name.contains('\\') {
            anyhow::bail!("ignore_file_name 必须是根目录下的文件名");
        }
        if name.trim() != name.as_str() {
            anyhow::bail!("ignore_file_name 不能以空白开头或结尾: {:?}", name);
        }

        if self.copy.max_selected_files == 0 {
            anyhow::bail!("max_selected_files 必须大于 0");
        }

        if self.copy.max_file_size_bytes == 0 {
            anyhow::bail!("max_file_size_bytes 必须大于 0");
        }

        PatternSet::parse_strict(&self.filter.default_includes)
            .context("default_includes 包含无效模式")?;
        PatternSet::parse_strict(&self.filter.default_excludes)
            .context("default_excludes 包含无效模式")?;

        Ok(())
    }

    /// 转换为遍历选项
    pub fn walk_options(&self, show_progress: bool) -> WalkOptions {
        WalkOptions {
            parallel: self.walk.parallel,
            follow_links: self.walk.follow_links,
            ignore_file_name: self.walk.ignore_file_name.clone(),
            show_progress,
        }
    }
}
