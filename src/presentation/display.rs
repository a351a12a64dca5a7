use std::io::Write;
use std::time::Instant;

use anyhow::Result;
use humansize::{format_size, BINARY};

use crate::domain::{FilterMode, WalkStats};

/// 格式化文件大小
pub fn format_file_size(size: u64) -> String {
    format_size(size, BINARY)
}

/// 格式化持续时间
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}.{:03}s", secs, duration.subsec_millis())
    }
}

/// 输出文件列表，已选中的文件带 `*` 标记
pub fn print_file_list<W: Write>(
    out: &mut W,
    files: &[String],
    is_selected: impl Fn(&str) -> bool,
) -> Result<()> {
    for file in files {
        let marker = if is_selected(file.as_str()) { '*' } else { ' ' };
        writeln!(out, "{} {}", marker, file)?;
    }
    Ok(())
}

/// 扫描摘要
pub struct WalkSummary {
    pub start_time: Instant,
    pub stats: WalkStats,
    pub mode: FilterMode,
    pub pattern: String,
    pub visible_files: usize,
}

impl WalkSummary {
    pub fn new(mode: FilterMode, pattern: String) -> Self {
        Self {
            start_time: Instant::now(),
            stats: WalkStats::default(),
            mode,
            pattern,
            visible_files: 0,
        }
    }

    pub fn print<W: Write>(&self, out: &mut W) -> Result<()> {
        let duration = self.start_time.elapsed();

        writeln!(out, "\n扫描摘要:")?;
        writeln!(out, "----------------------------")?;
        writeln!(out, "总用时: {}", format_duration(duration))?;
        writeln!(out, "扫描文件: {}", self.stats.files_seen)?;
        writeln!(out, "文本文件: {}", self.stats.text_files)?;
        writeln!(out, "二进制文件: {}", self.stats.binary_files)?;
        if self.stats.unreadable_files > 0 {
            writeln!(out, "无法读取: {}", self.stats.unreadable_files)?;
        }
        writeln!(out, "剪枝目录: {}", self.stats.pruned_dirs)?;
        match self.mode {
            FilterMode::Exclude => writeln!(out, "过滤模式: 排除 [{}]", self.pattern)?,
            FilterMode::Include => writeln!(out, "过滤模式: 包含 [{}]", self.pattern)?,
        }
        writeln!(out, "可见文件: {}", self.visible_files)?;

        Ok(())
    }
}
