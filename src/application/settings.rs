use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::FilterMode;

/// 单个目录保存的过滤设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySettings {
    pub includes: String,
    pub excludes: String,
    pub filter_mode: FilterMode,
    pub last_opened: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    directories: BTreeMap<String, DirectorySettings>,
}

/// 按根目录保存过滤设置
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    directories: BTreeMap<String, DirectorySettings>,
}

impl SettingsStore {
    /// 空的存储，尚未写入磁盘
    pub fn empty(path: PathBuf) -> Self {
        Self {
            path,
            directories: BTreeMap::new(),
        }
    }

    /// 默认位置：用户配置目录下的 copyeverything/settings.toml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("无法获取用户配置目录")?;
        Ok(config_dir.join("copyeverything").join("settings.toml"))
    }

    /// 加载设置，文件不存在或为空时得到空存储
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty(path.to_path_buf()))
            }
            Err(err) => {
                return Err(err).with_context(|| format!("无法读取设置文件: {}", path.display()))
            }
        };

        if content.trim().is_empty() {
            return Ok(Self::empty(path.to_path_buf()));
        }

        let file: SettingsFile = toml::from_str(&content)
            .with_context(|| format!("无法解析设置文件: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            directories: file.directories,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.directories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    pub fn get(&self, root: &Path) -> Option<&DirectorySettings> {
        self.directories.get(&key(root))
    }

    /// 打开目录：返回已保存的设置并刷新打开时间，没有时用 `defaults` 创建
    pub fn open(&mut self, root: &Path, defaults: DirectorySettings) -> DirectorySettings {
        let entry = self.directories.entry(key(root)).or_insert(defaults);
        entry.last_opened = Utc::now();
        entry.clone()
    }

    /// 记录当前过滤设置
    pub fn update(&mut self, root: &Path, mode: FilterMode, includes: &str, excludes: &str) {
        let settings = DirectorySettings {
            includes: includes.to_string(),
            excludes: excludes.to_string(),
            filter_mode: mode,
            last_opened: Utc::now(),
        };
        self.directories.insert(key(root), settings);
    }

    /// 原子写入：先写临时文件再重命名
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建设置目录: {}", parent.display()))?;
        }

        let file = SettingsFile {
            directories: self.directories.clone(),
        };
        let content = toml::to_string_pretty(&file).context("无法序列化设置")?;

        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        fs::write(&temp_path, content)
            .with_context(|| format!("无法写入临时设置文件: {}", temp_path.display()))?;

        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(err)
                .with_context(|| format!("无法重命名设置文件: {}", self.path.display()));
        }

        Ok(())
    }

    /// 删除设置文件，只保留当前目录的设置
    pub fn clear(&mut self, current_root: &Path) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("无法删除设置文件: {}", self.path.display()))
            }
        }

        let current = self.directories.remove(&key(current_root));
        self.directories.clear();
        if let Some(settings) = current {
            self.directories.insert(key(current_root), settings);
        }
        Ok(())
    }
}

/// 词法上整理路径：去掉 `.`，折叠 `..`，不访问文件系统
pub fn normalize_root(root: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in root.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            other => normalized.push(other),
        }
    }
    if normalized.as_os_str().is_empty() {
        normalized.push(".");
    }
    normalized
}

fn key(root: &Path) -> String {
    normalize_root(root).to_string_lossy().into_owned()
}
