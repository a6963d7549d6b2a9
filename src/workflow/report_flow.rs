//! 报表遍历流程 - 流程层
//!
//! 核心职责：把一种报表在全部业务单元上跑完。
//!
//! 流程顺序（每个单元）：
//! 1. 会话探测 →（必要时）恢复
//! 2. 首个单元走直接序列；之后的单元先重置过滤器
//! 3. 触发下载 → 立即归整产物，再进入下一个单元
//!
//! 会话恢复的预算是"整轮共 3 次"而不是每单元 3 次，
//! 门户持续无响应时不会陷入级联恢复。

use anyhow::Result;
use tracing::{error, info, warn};

use crate::error::{self, AppError, SessionError};
use crate::models::{ClientProfile, ReportKind};
use crate::services::{FileReconciler, ReportDownload, SessionService};
use crate::utils::logging;
use crate::utils::dates;
use crate::workflow::run_ctx::RunCtx;

/// 单元遍历状态
#[derive(Debug, Clone, Copy)]
struct UnitIteration {
    kind: ReportKind,
    unit_index: usize,
    /// 首个单元走直接序列，之后的要先重置过滤器
    is_first: bool,
}

/// 报表遍历流程
///
/// - 编排一种报表跨业务单元的完整遍历
/// - 决定何时探测会话、何时恢复、何时归整
/// - 不持有任何资源（页面 / 连接）
/// - 只依赖业务能力（services）
pub struct ReportFlow {
    session: SessionService,
    downloader: ReportDownload,
    reconciler: FileReconciler,
    /// 整轮遍历的会话恢复预算
    recovery_budget: usize,
}

impl ReportFlow {
    /// 创建新的报表遍历流程
    pub fn new(
        session: SessionService,
        downloader: ReportDownload,
        reconciler: FileReconciler,
        recovery_budget: usize,
    ) -> Self {
        Self {
            session,
            downloader,
            reconciler,
            recovery_budget,
        }
    }

    /// 跑完一种报表的全部业务单元
    pub async fn run_pass(
        &self,
        kind: ReportKind,
        ctx: &RunCtx,
        profile: &ClientProfile,
    ) -> Result<()> {
        logging::log_pass_start(kind.label(), profile.unidad_negocio);

        // 进入对应的报表界面
        self.session.navigate_to(kind.context()).await?;

        // 整轮共享的恢复计数
        let mut recoveries = 0usize;

        for unit_index in 0..profile.unidad_negocio as usize {
            let iteration = UnitIteration {
                kind,
                unit_index,
                is_first: unit_index == 0,
            };
            info!(
                "\n{} {} 处理{}报表 第 {}/{} 个业务单元",
                ctx,
                "─".repeat(20),
                kind.label(),
                unit_index + 1,
                profile.unidad_negocio
            );
            self.process_unit_with_recovery(iteration, ctx, profile, &mut recoveries)
                .await?;
        }

        logging::log_pass_complete(kind.label(), profile.unidad_negocio);
        Ok(())
    }

    /// 处理单个业务单元，会话失效时走恢复路径后重做
    async fn process_unit_with_recovery(
        &self,
        iteration: UnitIteration,
        ctx: &RunCtx,
        profile: &ClientProfile,
        recoveries: &mut usize,
    ) -> Result<()> {
        loop {
            // 任何交互之前先廉价探测会话
            if !self.session.is_session_active().await {
                self.recover(iteration.kind, profile, recoveries).await?;
            }

            match self.process_unit(iteration, ctx).await {
                Ok(()) => return Ok(()),
                // 会话过期，或瞬态重试耗尽且探测确认会话已失效：
                // 恢复后重做当前单元（预算扣整轮的账）
                Err(e)
                    if error::is_session_expired(&e)
                        || (error::is_transient(&e)
                            && !self.session.is_session_active().await) =>
                {
                    warn!(
                        "{} ⚠️ 单元 {} 交互失败且会话失效: {}",
                        ctx, iteration.unit_index, e
                    );
                    self.recover(iteration.kind, profile, recoveries).await?;
                }
                Err(e) => {
                    error!(
                        "{} ❌ 单元 {} 处理失败: {}",
                        ctx, iteration.unit_index, e
                    );
                    return Err(e);
                }
            }
        }
    }

    /// 执行一次会话恢复，超出整轮预算即失败
    async fn recover(
        &self,
        kind: ReportKind,
        profile: &ClientProfile,
        recoveries: &mut usize,
    ) -> Result<()> {
        *recoveries += 1;
        if *recoveries > self.recovery_budget {
            return Err(AppError::Session(SessionError::RecoveryExhausted {
                attempts: self.recovery_budget,
            })
            .into());
        }

        info!(
            "♻️ 会话恢复 第 {}/{} 次 (上下文: {})",
            recoveries,
            self.recovery_budget,
            kind.context()
        );

        let resumed = self
            .session
            .recover_and_resume(profile, kind.context())
            .await?;
        if !resumed {
            // 映射里没有这个上下文，按致命错误处理
            return Err(AppError::Session(SessionError::UnknownContext {
                context: kind.context().to_string(),
            })
            .into());
        }
        Ok(())
    }

    /// 单个业务单元的界面序列 + 归整
    async fn process_unit(&self, iteration: UnitIteration, ctx: &RunCtx) -> Result<()> {
        if iteration.is_first {
            // 直接序列
            self.downloader.select_unit_option(iteration.unit_index).await?;
            if iteration.kind == ReportKind::Ventas {
                let (start, end) = dates::compute_range(ctx.fecha)?;
                self.downloader.set_date_range(start, end).await?;
            }
        } else {
            // 控件保留了上一个单元的状态，先清掉
            self.downloader.reset_filters().await?;
            self.downloader.select_unit_option(iteration.unit_index).await?;
        }

        self.downloader.trigger_download(iteration.kind).await?;

        // 下载完必须立即归整：下一个单元的产物匹配按文件时间来，
        // 留着未消费的产物会串档
        let target = self
            .reconciler
            .reconcile(iteration.unit_index, iteration.kind, &ctx.date_stamp)?;
        info!(
            "{} ✓ 单元 {} 的{}报表已归整: {}",
            ctx,
            iteration.unit_index,
            iteration.kind.label(),
            target.display()
        );
        Ok(())
    }
}
