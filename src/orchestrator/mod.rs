//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层是整个系统的"指挥中心"，负责一次客户执行的完整状态机：
//!
//! ```text
//! 幂等检查 → 登录 → 参考日期校验 → 遍历(销售) → 遍历(库存) → 登出 → 台账置成功
//! ```
//!
//! 任何一步失败，都由本层负责把台账落成明确的终态后再上抛，
//! 进程退出后不允许残留 pending 记录。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (一次客户执行)
//!     ↓
//! workflow::ReportFlow (一种报表跨业务单元)
//!     ↓
//! services (能力层：session / download / reconcile)
//!     ↓
//! infrastructure + clients (资源层：UiDriver / RunLedger)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源所有者**：只有编排层同时持有驱动和台账连接
//! 2. **唯一写成功点**：只有状态机的最后一步允许把台账置为成功
//! 3. **失败先落账**：异常先转成台账终态更新，再向调用方传播

pub mod run_processor;

pub use run_processor::{App, RunOutcome};
