//! # B2B Report Download
//!
//! 面向药房渠道 B2B 门户的报表自动下载程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure / Clients）
//! - `infrastructure/` - 持有稀缺资源（浏览器页面），只暴露能力
//! - `UiDriver` - 远程 UI 驱动能力（导航 / 等元素 / 点击 / 读属性）
//! - `clients/` - 执行台账能力（幂等闸门 / 审计记录 / 命名模式）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个业务单元
//! - `SessionService` - 登录 / 过期探测 / 会话恢复能力
//! - `ReportDownload` - 单元选择 / 日期区间 / 触发下载能力
//! - `FileReconciler` - 产物归整能力（新鲜度窗口 + 隔离解压）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一种报表跨业务单元"的完整遍历
//! - `RunCtx` - 执行上下文封装（客户 + 渠道 + 参考日期）
//! - `ReportFlow` - 流程编排（会话探测 → 单元序列 → 下载 → 归整）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/` - 一次客户执行的完整状态机，管理资源与台账终态
//!
//! ## 模块结构

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{MySqlRunLedger, RunLedger};
pub use config::Config;
pub use error::AppError;
pub use infrastructure::{ElementRef, PortalDriver, UiDriver};
pub use models::{ClientProfile, ReferenceDate, ReportKind, RunStatus, UnitPattern};
pub use orchestrator::{App, RunOutcome};
pub use workflow::{ReportFlow, RunCtx};
