//! 客户档案
//!
//! 每次执行开始时从台账加载一次，整个执行期间只读

/// 客户档案
///
/// 对应台账中 cliente / clientes 两张表的联合结果
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientProfile {
    /// 客户内部 ID（cliente.id）
    pub id: i64,
    /// 客户标识（命令行传入的 cliente）
    pub cliente: String,
    /// 客户显示名（clientes.Nombre，用作下载目录名）
    pub nombre: String,
    /// 门户登录用户名
    pub user: String,
    /// 门户登录密码
    pub password: String,
    /// 业务单元数量，决定每种报表的遍历次数
    pub unidad_negocio: u32,
}

/// 业务单元的文件命名模式
///
/// 从台账按 unidad_negocio_id 降序取出，按遍历下标索引
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UnitPattern {
    pub unidad_negocio_id: i64,
    /// 销售报表文件名前缀
    pub archivo_venta: String,
    /// 库存报表文件名前缀
    pub archivo_inventario: String,
}

impl UnitPattern {
    /// 取指定报表类型的命名前缀
    pub fn prefix(&self, kind: super::ReportKind) -> &str {
        match kind {
            super::ReportKind::Ventas => &self.archivo_venta,
            super::ReportKind::Inventario => &self.archivo_inventario,
        }
    }
}
