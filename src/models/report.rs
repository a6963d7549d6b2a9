//! 报表类型与执行记录状态

use chrono::NaiveDate;

/// 报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ReportKind {
    /// 销售报表（门户打包为 zip 下载）
    Ventas,
    /// 库存报表（门户直接给 csv）
    Inventario,
}

impl ReportKind {
    /// 恢复导航用的逻辑上下文名
    pub fn context(self) -> &'static str {
        match self {
            ReportKind::Ventas => "ventas",
            ReportKind::Inventario => "inventario",
        }
    }

    /// 下载产物文件名必须包含的约定片段
    pub fn name_convention(self) -> &'static str {
        match self {
            ReportKind::Ventas => "venta",
            ReportKind::Inventario => "detalleinventario",
        }
    }

    /// 日志显示名
    pub fn label(self) -> &'static str {
        match self {
            ReportKind::Ventas => "销售",
            ReportKind::Inventario => "库存",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 门户状态栅格上刮取的参考日期
///
/// 每次执行只刮取一次，之后不可变
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReferenceDate {
    /// 门户声明的最新销售数据日期
    pub fecha: NaiveDate,
    /// 门户显示的最近一次装载标记
    pub ultima_carga: String,
}

impl ReferenceDate {
    /// 规范文件名用的日期戳（YYYYMMDD）
    pub fn date_stamp(&self) -> String {
        self.fecha.format("%Y%m%d").to_string()
    }
}

/// 执行记录状态
///
/// 台账中一行执行记录在一次尝试开始时以 Pending 写入，
/// 结束时至多更新一次为 Success 或 Failed；
/// 进程退出后不允许残留 Pending 记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// 尝试已开始，尚无结论
    Pending = 0,
    /// 两种报表全部完成
    Success = 1,
    /// 明确失败（含参考日期过旧被拒）
    Failed = 2,
}

impl RunStatus {
    /// 台账 estado 列的数值
    pub fn code(self) -> i8 {
        self as i8
    }

    /// 从 estado 列数值解析
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(RunStatus::Pending),
            1 => Some(RunStatus::Success),
            2 => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}
