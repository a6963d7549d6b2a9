//! 执行台账客户端
//!
//! 幂等闸门与审计记录的唯一出入口。
//! 一行执行记录以 (cliente, cadena, 当天) 定位，绝不用
//! "按 id 倒序取第一行"这种顺序依赖的写法。

use anyhow::Result;
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::error::{AppError, LedgerError};
use crate::models::{ClientProfile, RunStatus, UnitPattern};

/// 执行台账能力
///
/// 职责：
/// - 客户档案与命名模式查询
/// - 当天成功记录的幂等检查
/// - 执行记录的写入与终态更新
#[async_trait]
pub trait RunLedger: Send + Sync {
    /// 查询客户档案，找不到视为致命配置问题
    async fn get_client_profile(&self, cliente: &str, cadena: &str) -> Result<ClientProfile>;

    /// 当天是否已有成功记录（幂等闸门）
    async fn has_success_today(&self, cliente: &str, cadena: &str) -> Result<bool>;

    /// 写入一条 pending 执行记录，标记尝试开始
    async fn insert_run(&self, cliente: &str, cadena: &str) -> Result<()>;

    /// 更新当天执行记录的终态
    async fn update_run_status(
        &self,
        cliente: &str,
        cadena: &str,
        status: RunStatus,
    ) -> Result<()>;

    /// 客户全部业务单元的命名模式，按 unidad_negocio_id 降序
    async fn unit_naming_patterns(&self, cliente_id: i64) -> Result<Vec<UnitPattern>>;

    /// 释放数据库连接
    async fn close(&self);
}

/// MySQL 台账实现
pub struct MySqlRunLedger {
    pool: MySqlPool,
}

impl MySqlRunLedger {
    /// 连接台账数据库
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!("连接台账数据库...");
        let pool = MySqlPool::connect(database_url).await.map_err(|e| {
            AppError::Ledger(LedgerError::ConnectionFailed {
                source: Box::new(e),
            })
        })?;
        info!("✓ 台账数据库连接成功");
        Ok(Self { pool })
    }
}

#[async_trait]
impl RunLedger for MySqlRunLedger {
    async fn get_client_profile(&self, cliente: &str, cadena: &str) -> Result<ClientProfile> {
        let row = sqlx::query(
            r#"
            SELECT c.id, c.cliente, cl.Nombre, c.user, c.password, c.unidad_negocio
            FROM cliente c
            JOIN clientes cl ON c.id_cliente = cl.id_cliente
            WHERE c.cliente = ? AND c.cadena = ?
            "#,
        )
        .bind(cliente)
        .bind(cadena)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::Ledger(LedgerError::QueryFailed {
                operation: "get_client_profile".to_string(),
                source: Box::new(e),
            })
        })?;

        let row = row.ok_or_else(|| {
            AppError::Ledger(LedgerError::ClientNotFound {
                cliente: cliente.to_string(),
            })
        })?;

        let unidad_negocio: i64 = row.try_get("unidad_negocio").map_err(|e| {
            AppError::Ledger(LedgerError::QueryFailed {
                operation: "get_client_profile.unidad_negocio".to_string(),
                source: Box::new(e),
            })
        })?;

        Ok(ClientProfile {
            id: row.try_get("id")?,
            cliente: row.try_get("cliente")?,
            nombre: row.try_get("Nombre")?,
            user: row.try_get("user")?,
            password: row.try_get("password")?,
            unidad_negocio: u32::try_from(unidad_negocio.max(0)).unwrap_or(0),
        })
    }

    async fn has_success_today(&self, cliente: &str, cadena: &str) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT estado
            FROM log_script_carga_cadena_cliente
            WHERE cliente = ? AND cadena = ?
              AND DATE(created_at) = CURDATE()
              AND estado = 1
            "#,
        )
        .bind(cliente)
        .bind(cadena)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::Ledger(LedgerError::QueryFailed {
                operation: "has_success_today".to_string(),
                source: Box::new(e),
            })
        })?;

        Ok(row.is_some())
    }

    async fn insert_run(&self, cliente: &str, cadena: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO log_script_carga_cadena_cliente (cliente, cadena, created_at, estado)
            VALUES (?, ?, NOW(), ?)
            "#,
        )
        .bind(cliente)
        .bind(cadena)
        .bind(RunStatus::Pending.code())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::ledger_write_failed("insert_run", e))?;

        debug!("已写入 pending 执行记录: {} / {}", cliente, cadena);
        Ok(())
    }

    async fn update_run_status(
        &self,
        cliente: &str,
        cadena: &str,
        status: RunStatus,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE log_script_carga_cadena_cliente
            SET estado = ?, updated_at = NOW()
            WHERE cliente = ? AND cadena = ?
              AND DATE(created_at) = CURDATE()
            "#,
        )
        .bind(status.code())
        .bind(cliente)
        .bind(cadena)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::ledger_write_failed("update_run_status", e))?;

        info!("✓ 执行记录已更新为 {}: {} / {}", status, cliente, cadena);
        Ok(())
    }

    async fn unit_naming_patterns(&self, cliente_id: i64) -> Result<Vec<UnitPattern>> {
        let rows = sqlx::query(
            r#"
            SELECT unidad_negocio_id, archivo_venta, archivo_inventario
            FROM cliente_unidad_negocio
            WHERE cliente_id = ?
            ORDER BY unidad_negocio_id DESC
            "#,
        )
        .bind(cliente_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::Ledger(LedgerError::QueryFailed {
                operation: "unit_naming_patterns".to_string(),
                source: Box::new(e),
            })
        })?;

        let mut patterns = Vec::with_capacity(rows.len());
        for row in rows {
            patterns.push(UnitPattern {
                unidad_negocio_id: row.try_get("unidad_negocio_id")?,
                archivo_venta: row.try_get("archivo_venta")?,
                archivo_inventario: row.try_get("archivo_inventario")?,
            });
        }
        Ok(patterns)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
