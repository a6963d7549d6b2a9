//! 文件归整服务 - 业务能力层
//!
//! 把下载目录里刚落盘的产物归整成确定性命名的规范文件。
//! 下载目录在整轮执行中被所有单元共用，只靠
//! "新鲜度窗口 + 隔离解压目录"来避免跨单元串档，
//! 所以每个单元下载完必须立即归整，再处理下一个单元。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, ConfigError, FileError};
use crate::models::{ReportKind, UnitPattern};

/// 文件归整服务
pub struct FileReconciler {
    /// 浏览器下载目录（.../Zip）
    download_dir: PathBuf,
    /// 规范文件输出目录（下载目录的上一级）
    output_dir: PathBuf,
    /// 命名模式，按 unidad_negocio_id 降序，与遍历下标对齐
    patterns: Vec<UnitPattern>,
    /// 产物新鲜度窗口
    fresh_window: Duration,
}

impl FileReconciler {
    /// 创建新的文件归整服务
    pub fn new(
        download_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        patterns: Vec<UnitPattern>,
        fresh_window: Duration,
    ) -> Self {
        Self {
            download_dir: download_dir.into(),
            output_dir: output_dir.into(),
            patterns,
            fresh_window,
        }
    }

    /// 把指定单元刚下载的产物归整为规范文件
    ///
    /// # 参数
    /// - `unit_index`: 业务单元遍历下标
    /// - `kind`: 报表类型
    /// - `date_stamp`: 规范文件名里的日期戳（YYYYMMDD）
    ///
    /// # 返回
    /// 规范文件的完整路径
    pub fn reconcile(
        &self,
        unit_index: usize,
        kind: ReportKind,
        date_stamp: &str,
    ) -> Result<PathBuf> {
        let pattern = self.patterns.get(unit_index).ok_or_else(|| {
            AppError::Config(ConfigError::MissingUnitPattern {
                unit_index,
                available: self.patterns.len(),
            })
        })?;

        info!(
            "🗂️ 归整{}报表 (单元 {}, unidad_negocio_id {})",
            kind.label(),
            unit_index,
            pattern.unidad_negocio_id
        );

        let target = match kind {
            ReportKind::Ventas => self.reconcile_ventas(pattern, date_stamp)?,
            ReportKind::Inventario => self.reconcile_inventario(pattern, date_stamp)?,
        };

        info!("✓ 规范文件已就位: {}", target.display());
        Ok(target)
    }

    /// 销售报表：最新鲜的 zip → 隔离解压 → 取出约定 csv
    fn reconcile_ventas(&self, pattern: &UnitPattern, date_stamp: &str) -> Result<PathBuf> {
        let archive = self.latest_fresh_archive()?;
        debug!("选中压缩包: {}", archive.display());

        // 解压到隔离的临时目录，避免与其他单元的文件撞名
        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "archivo".to_string());
        let temp_dir = self.output_dir.join(format!("temp_{}", stem));
        fs::create_dir_all(&temp_dir)
            .with_context(|| format!("无法创建临时目录: {}", temp_dir.display()))?;

        let result = self.extract_and_place(&archive, &temp_dir, pattern, date_stamp);

        // 无论成败都清掉临时目录
        if temp_dir.exists() {
            let _ = fs::remove_dir_all(&temp_dir);
        }

        let target = result?;

        // 压缩包已被消费，删掉它，免得污染后续单元的按时间匹配
        fs::remove_file(&archive)
            .with_context(|| format!("无法删除已消费的压缩包: {}", archive.display()))?;

        Ok(target)
    }

    fn extract_and_place(
        &self,
        archive: &Path,
        temp_dir: &Path,
        pattern: &UnitPattern,
        date_stamp: &str,
    ) -> Result<PathBuf> {
        let file = fs::File::open(archive)
            .with_context(|| format!("无法打开压缩包: {}", archive.display()))?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| {
            AppError::File(FileError::ExtractionFailed {
                archive: archive.to_path_buf(),
                source: Box::new(e),
            })
        })?;
        zip.extract(temp_dir).map_err(|e| {
            AppError::File(FileError::ExtractionFailed {
                archive: archive.to_path_buf(),
                source: Box::new(e),
            })
        })?;

        // 在解压结果中找符合销售命名约定的 csv
        let convention = Regex::new(r"(?i)venta.*\.csv$")?;
        let entries = fs::read_dir(temp_dir)
            .with_context(|| format!("无法读取临时目录: {}", temp_dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if path.is_file() && convention.is_match(&name) {
                return self.place_canonical(&path, pattern.prefix(ReportKind::Ventas), date_stamp);
            }
        }

        Err(AppError::File(FileError::NoMatchingEntry {
            archive: archive.to_path_buf(),
        })
        .into())
    }

    /// 库存报表：门户直接给 csv，选最新的约定命名文件
    fn reconcile_inventario(&self, pattern: &UnitPattern, date_stamp: &str) -> Result<PathBuf> {
        let convention = Regex::new(r"(?i)detalleinventario.*\.csv$")?;

        let mut candidates: Vec<(PathBuf, SystemTime)> = Vec::new();
        let entries = fs::read_dir(&self.download_dir)
            .with_context(|| format!("无法读取下载目录: {}", self.download_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if path.is_file() && convention.is_match(&name) {
                let created = created_time(&path)?;
                candidates.push((path, created));
            }
        }

        // 最新创建的排前面
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let (latest, _) = candidates.into_iter().next().ok_or_else(|| {
            AppError::no_recent_artifact("inventario", self.download_dir.clone())
        })?;

        self.place_canonical(&latest, pattern.prefix(ReportKind::Inventario), date_stamp)
    }

    /// 找下载目录里新鲜度窗口内最新创建的 zip
    ///
    /// 下载目录会在整轮执行中累积文件，窗口外的一律不认，
    /// 防止拿到陈旧的或还没下载完的产物
    fn latest_fresh_archive(&self) -> Result<PathBuf> {
        let mut archives: Vec<(PathBuf, SystemTime)> = Vec::new();
        let entries = fs::read_dir(&self.download_dir)
            .with_context(|| format!("无法读取下载目录: {}", self.download_dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let is_zip = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("zip"))
                .unwrap_or(false);
            if path.is_file() && is_zip {
                let created = created_time(&path)?;
                archives.push((path, created));
            }
        }

        archives.sort_by(|a, b| b.1.cmp(&a.1));

        let now = SystemTime::now();
        for (path, created) in archives {
            let age = now.duration_since(created).unwrap_or_default();
            if age < self.fresh_window {
                debug!("最新鲜的压缩包: {} (age {:?})", path.display(), age);
                return Ok(path);
            }
        }

        Err(AppError::no_recent_artifact("ventas", self.download_dir.clone()).into())
    }

    /// 把产物移动为规范文件，后写覆盖先写
    fn place_canonical(&self, src: &Path, prefix: &str, date_stamp: &str) -> Result<PathBuf> {
        let target = self.output_dir.join(format!("{}{}.csv", prefix, date_stamp));

        // 同名旧文件先删掉，保证该路径上只有一个候选
        if target.exists() {
            fs::remove_file(&target).map_err(|e| {
                AppError::File(FileError::MoveFailed {
                    from: src.to_path_buf(),
                    to: target.clone(),
                    source: Box::new(e),
                })
            })?;
        }

        fs::rename(src, &target).map_err(|e| {
            AppError::File(FileError::MoveFailed {
                from: src.to_path_buf(),
                to: target.clone(),
                source: Box::new(e),
            })
        })?;

        Ok(target)
    }
}

/// 文件创建时间，个别文件系统不记录出生时间时退回修改时间
fn created_time(path: &Path) -> Result<SystemTime> {
    let meta = fs::metadata(path)
        .with_context(|| format!("无法读取文件元数据: {}", path.display()))?;
    Ok(meta.created().or_else(|_| meta.modified())?)
}
