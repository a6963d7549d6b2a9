//! 报表下载服务 - 业务能力层
//!
//! 只负责单个业务单元的界面操作：选单元、设日期区间、触发下载，
//! 以及从状态栅格刮取参考日期。不出现单元遍历，不关心台账。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::infrastructure::UiDriver;
use crate::models::{ReferenceDate, ReportKind};
use crate::services::selectors;
use crate::utils::{dates, RetryPolicy};

/// 报表下载服务
///
/// 职责：
/// - 状态栅格刮取（参考日期）
/// - 业务单元下拉选择 / 过滤器重置
/// - 日期区间设置（仅销售报表）
/// - 触发两种报表的导出下载
#[derive(Clone)]
pub struct ReportDownload {
    driver: Arc<dyn UiDriver>,
    element_timeout: Duration,
    /// 门户生成报表较慢，下载链接单独给更长的超时
    link_timeout: Duration,
    step_pause: Duration,
    settle_pause: Duration,
    retry: RetryPolicy,
}

impl ReportDownload {
    /// 创建新的报表下载服务
    pub fn new(
        driver: Arc<dyn UiDriver>,
        element_timeout: Duration,
        link_timeout: Duration,
        step_pause: Duration,
        settle_pause: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            driver,
            element_timeout,
            link_timeout,
            step_pause,
            settle_pause,
            retry,
        }
    }

    /// 从状态栅格刮取参考日期
    ///
    /// 登录后门户首页的栅格里有一行 «Ventas»，
    /// 第 5、6 个单元格分别是数据日期和最近装载标记
    pub async fn scrape_reference_date(&self) -> Result<ReferenceDate> {
        info!("📅 正在刮取门户参考日期...");
        sleep(self.step_pause).await;

        // 确认栅格已经渲染出 Ventas 行
        self.driver
            .wait_for_element(selectors::GRID_VENTAS_ROW, self.element_timeout)
            .await?;

        let fecha_cell = self
            .driver
            .wait_for_element(selectors::GRID_FECHA_CELL, self.element_timeout)
            .await?;
        let fecha_raw = self
            .driver
            .read_attribute(&fecha_cell, "title")
            .await?
            .unwrap_or_default();
        debug!(
            "栅格原始日期串: {}",
            crate::utils::logging::truncate_text(&fecha_raw, 40)
        );
        let fecha = dates::parse_portal_date(&fecha_raw)?;

        let carga_cell = self
            .driver
            .wait_for_element(selectors::GRID_ULTIMA_CARGA_CELL, self.element_timeout)
            .await?;
        let carga_raw = self
            .driver
            .read_attribute(&carga_cell, "title")
            .await?
            .unwrap_or_default();
        // 只保留日期部分，丢掉时间
        let ultima_carga = carga_raw
            .split_whitespace()
            .next()
            .unwrap_or(&carga_raw)
            .to_string();

        info!("✓ 参考日期: {} | 最近装载: {}", fecha, ultima_carga);
        Ok(ReferenceDate {
            fecha,
            ultima_carga,
        })
    }

    /// 在下拉框中选择业务单元
    pub async fn select_unit_option(&self, unit_index: usize) -> Result<()> {
        debug!("选择业务单元下拉项 {}", unit_index);
        let option_selector = selectors::unit_option(unit_index);

        self.retry
            .run("业务单元下拉", || {
                let option_selector = option_selector.clone();
                async move {
                    // 打开下拉
                    let select = self
                        .driver
                        .wait_for_element(selectors::UNIT_SELECT, self.element_timeout)
                        .await?;
                    self.driver.click(&select).await?;
                    sleep(self.step_pause).await;

                    // 点击目标单元
                    let option = self
                        .driver
                        .wait_for_element(&option_selector, self.element_timeout)
                        .await?;
                    self.driver.click(&option).await
                }
            })
            .await?;

        sleep(self.step_pause).await;
        Ok(())
    }

    /// 设置日期区间（仅销售报表的首个单元需要）
    pub async fn set_date_range(&self, start: NaiveDate, end: NaiveDate) -> Result<()> {
        let start_iso = dates::to_iso(start);
        let end_iso = dates::to_iso(end);
        info!("📆 设置日期区间: {} ~ {}", start_iso, end_iso);

        let start_picker = self
            .driver
            .wait_for_element(selectors::DATE_START_PICKER, self.element_timeout)
            .await?;
        self.driver.set_value(&start_picker, &start_iso).await?;

        let end_picker = self
            .driver
            .wait_for_element(selectors::DATE_END_PICKER, self.element_timeout)
            .await?;
        self.driver.set_value(&end_picker, &end_iso).await?;

        sleep(self.step_pause).await;
        Ok(())
    }

    /// 重置过滤器
    ///
    /// 报表控件会保留上一个单元的选择状态，
    /// 第二个及之后的单元必须先清掉
    pub async fn reset_filters(&self) -> Result<()> {
        debug!("重置过滤器");
        self.click_when_ready(selectors::FILTER_RESET_BUTTON, "过滤器重置按钮")
            .await?;
        sleep(self.step_pause).await;
        Ok(())
    }

    /// 触发指定类型报表的导出下载
    ///
    /// 完成后产物会出现在浏览器的下载目录中：
    /// 销售报表是 zip 压缩包，库存报表是裸 csv
    pub async fn trigger_download(&self, kind: ReportKind) -> Result<()> {
        info!("📤 触发{}报表导出...", kind.label());

        // 生成报表
        self.click_when_ready(selectors::GENERATE_BUTTON, "生成按钮")
            .await?;
        sleep(self.step_pause).await;

        // 打开下载菜单
        self.click_when_ready(selectors::DOWNLOAD_MENU_BUTTON, "下载菜单")
            .await?;
        sleep(self.step_pause).await;

        // 选择导出方式
        let export_option = match kind {
            ReportKind::Ventas => selectors::SALES_EXPORT_OPTION,
            ReportKind::Inventario => selectors::INVENTORY_EXPORT_OPTION,
        };
        self.click_when_ready(export_option, "导出方式").await?;
        sleep(self.step_pause).await;

        // CSV 格式 + 应用
        self.click_when_ready(selectors::CSV_FORMAT_RADIO, "CSV 格式")
            .await?;
        self.click_when_ready(selectors::EXPORT_APPLY_BUTTON, "应用按钮")
            .await?;

        // 等待门户生成下载链接并点击
        let link_selector = match kind {
            ReportKind::Ventas => selectors::SALES_CSV_LINK,
            ReportKind::Inventario => selectors::INVENTORY_CSV_LINK,
        };
        let link = self
            .driver
            .wait_for_element(link_selector, self.link_timeout)
            .await?;
        self.driver.click(&link).await?;

        // 等文件落盘
        sleep(self.settle_pause).await;
        info!("✓ {}报表下载动作完成", kind.label());
        Ok(())
    }

    /// 等待元素出现并点击，带限次重试
    async fn click_when_ready(&self, selector: &str, description: &str) -> Result<()> {
        self.retry
            .run(description, || async move {
                let element = self
                    .driver
                    .wait_for_element(selector, self.element_timeout)
                    .await?;
                self.driver.click(&element).await
            })
            .await
    }
}
