//! 执行上下文
//!
//! 封装"我正在为哪个客户、哪个渠道、以哪个参考日期执行"这一信息

use std::fmt::Display;

use chrono::NaiveDate;

/// 执行上下文
///
/// 一次执行只构造一次，之后只读
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 客户标识（命令行传入）
    pub cliente: String,

    /// 渠道标识
    pub cadena: String,

    /// 客户显示名
    pub nombre: String,

    /// 门户参考日期
    pub fecha: NaiveDate,

    /// 规范文件名用的日期戳（YYYYMMDD）
    pub date_stamp: String,
}

impl RunCtx {
    /// 创建新的执行上下文
    pub fn new(
        cliente: String,
        cadena: String,
        nombre: String,
        fecha: NaiveDate,
        date_stamp: String,
    ) -> Self {
        Self {
            cliente,
            cadena,
            nombre,
            fecha,
            date_stamp,
        }
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[客户 {} 渠道 {} 参考日期 {}]",
            self.cliente, self.cadena, self.fecha
        )
    }
}
