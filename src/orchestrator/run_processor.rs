//! 客户执行处理器 - 编排层
//!
//! ## 核心功能
//!
//! 1. **幂等闸门**：当天已有成功记录则直接短路，零副作用
//! 2. **档案加载**：客户档案一次加载，整个执行只读
//! 3. **目录布局**：`<base>/<客户显示名>/<渠道目录>/Zip` 按需创建
//! 4. **状态机**：登录 → 参考日期校验 → 两轮报表遍历 → 登出 → 置成功
//! 5. **失败保证**：已写入的执行记录必然被更新为终态；资源必然释放

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::clients::RunLedger;
use crate::config::Config;
use crate::error::{AppError, ConfigError};
use crate::infrastructure::UiDriver;
use crate::models::{ReportKind, RunStatus};
use crate::services::{FileReconciler, ReportDownload, SessionService};
use crate::utils::{dates, RetryPolicy};
use crate::workflow::{ReportFlow, RunCtx};

/// 一次执行的结论
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// 两种报表全部完成，台账已置成功
    Completed,
    /// 当天已有成功记录，本次未做任何事
    AlreadyDone,
    /// 参考日期过旧被拒，台账已记录失败
    StaleData,
}

/// 应用主结构
pub struct App {
    config: Config,
    ledger: Arc<dyn RunLedger>,
    driver: Arc<dyn UiDriver>,
    /// 本次尝试是否已写入台账记录
    run_recorded: AtomicBool,
}

impl App {
    /// 创建新的应用
    pub fn new(config: Config, ledger: Arc<dyn RunLedger>, driver: Arc<dyn UiDriver>) -> Self {
        Self {
            config,
            ledger,
            driver,
            run_recorded: AtomicBool::new(false),
        }
    }

    /// 执行一次客户的报表下载
    ///
    /// 无论成败，返回前保证：
    /// - 已写入的执行记录被更新为明确终态（不残留 pending）
    /// - 驱动与台账连接被释放
    pub async fn run(&self, cliente: &str) -> Result<RunOutcome> {
        let result = self.execute(cliente).await;

        if result.is_err() && self.run_recorded.load(Ordering::SeqCst) {
            // 失败也要把台账落成终态
            if let Err(update_err) = self
                .ledger
                .update_run_status(cliente, &self.config.cadena, RunStatus::Failed)
                .await
            {
                // 台账写入失败不能吞掉，叠加到日志后仍以原始错误上抛
                error!("❌ 失败终态写入台账失败: {}", update_err);
            }
        }

        // 无论成败都释放资源
        self.driver.close().await;
        self.ledger.close().await;

        result
    }

    async fn execute(&self, cliente: &str) -> Result<RunOutcome> {
        let cadena = self.config.cadena.clone();

        // ========== 闸门 1: 幂等检查 ==========
        if self.ledger.has_success_today(cliente, &cadena).await? {
            info!("✅ 今天已有成功记录，直接退出");
            return Ok(RunOutcome::AlreadyDone);
        }

        // ========== 闸门 2: 客户档案 ==========
        let profile = self.ledger.get_client_profile(cliente, &cadena).await?;
        info!(
            "👤 客户档案: {} ({}), 业务单元 {} 个",
            profile.cliente, profile.nombre, profile.unidad_negocio
        );
        if profile.unidad_negocio == 0 {
            return Err(AppError::Config(ConfigError::NoBusinessUnits {
                cliente: cliente.to_string(),
            })
            .into());
        }

        // 目录布局：<base>/<显示名>/<渠道目录>/Zip
        let output_dir = PathBuf::from(&self.config.archivo_base)
            .join(&profile.nombre)
            .join(&self.config.chain_dir);
        let download_dir = output_dir.join("Zip");
        std::fs::create_dir_all(&download_dir)
            .with_context(|| format!("无法创建下载目录: {}", download_dir.display()))?;
        self.driver.set_download_dir(&download_dir).await?;

        // 命名模式一次取全，少于业务单元数直接判配置错误
        let patterns = self.ledger.unit_naming_patterns(profile.id).await?;
        if patterns.len() < profile.unidad_negocio as usize {
            return Err(AppError::Config(ConfigError::MissingUnitPattern {
                unit_index: patterns.len(),
                available: patterns.len(),
            })
            .into());
        }

        // 构建服务
        let retry = RetryPolicy::new(
            self.config.interaction_retries,
            Duration::from_secs(self.config.retry_pause_secs),
        );
        let element_timeout = Duration::from_secs(self.config.element_timeout_secs);
        let step_pause = Duration::from_secs(self.config.step_pause_secs);

        let session = SessionService::new(
            self.driver.clone(),
            self.config.base_url.clone(),
            element_timeout,
            step_pause,
            retry,
        );
        let downloader = ReportDownload::new(
            self.driver.clone(),
            element_timeout,
            Duration::from_secs(self.config.download_link_timeout_secs),
            step_pause,
            Duration::from_secs(self.config.download_settle_secs),
            retry,
        );
        let reconciler = FileReconciler::new(
            download_dir,
            output_dir,
            patterns,
            Duration::from_secs(self.config.artifact_fresh_secs),
        );

        // ========== 闸门 3: 登录 ==========
        // 此时还没写台账，登录失败不会留下记录
        session.login(&profile).await?;

        // ========== 闸门 4: 参考日期 ==========
        let reference = downloader.scrape_reference_date().await?;
        let today = chrono::Local::now().date_naive();
        if !dates::is_fresh(reference.fecha, today, self.config.max_reference_age_days) {
            // 刻意记录这次尝试：先写 pending 再立即置失败，
            // 让运维能看到"看过了但被拒"，区别于"根本没跑"
            self.ledger.insert_run(cliente, &cadena).await?;
            self.run_recorded.store(true, Ordering::SeqCst);
            self.ledger
                .update_run_status(cliente, &cadena, RunStatus::Failed)
                .await?;
            warn!(
                "⚠️ 参考日期 {} 距今天 {} 超过 {} 天，拒绝执行",
                reference.fecha, today, self.config.max_reference_age_days
            );
            return Ok(RunOutcome::StaleData);
        }

        let ctx = RunCtx::new(
            cliente.to_string(),
            cadena.clone(),
            profile.nombre.clone(),
            reference.fecha,
            reference.date_stamp(),
        );
        info!("{} 参考日期有效，开始下载", ctx);

        // ========== 闸门 5: 记录尝试开始 ==========
        self.ledger.insert_run(cliente, &cadena).await?;
        self.run_recorded.store(true, Ordering::SeqCst);

        // ========== 两轮报表遍历 ==========
        let flow = ReportFlow::new(
            session.clone(),
            downloader,
            reconciler,
            self.config.recovery_budget,
        );
        flow.run_pass(ReportKind::Ventas, &ctx, &profile).await?;
        flow.run_pass(ReportKind::Inventario, &ctx, &profile).await?;

        // ========== 收尾：先登出再置成功 ==========
        session.logout().await?;
        self.ledger
            .update_run_status(cliente, &cadena, RunStatus::Success)
            .await?;

        info!("{} ✅ 全部报表处理完成", ctx);
        Ok(RunOutcome::Completed)
    }
}
