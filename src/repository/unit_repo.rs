// ==========================================
// 库存分配引擎 - 库存单元仓储
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.4 执行提交协议
// 依据: ERP_Alloc_Core_Spec.md - 5. 并发契约
// ==========================================
// 红线: 数量扣减只走条件更新(CAS 等价),绝不读改写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::types::{PerformanceRating, UnitStatus};
use crate::domain::unit::InventoryUnit;
use crate::engine::pool::InventoryPool;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// inventory_unit 表查询列（与 map_row 索引一一对应）
const UNIT_COLUMNS: &str = "unit_id, product_id, location_code, batch_no, \
     quantity_received, quantity_available, unit_cost, acquisition_date, \
     warranty_expiry_date, performance_rating, failure_count, status, \
     created_at, updated_at, updated_by";

// ==========================================
// UnitRepository - 库存单元仓储
// ==========================================
/// 库存单元仓储
/// 职责: inventory_unit 表的 CRUD 与预留协议原语
pub struct UnitRepository {
    conn: Arc<Mutex<Connection>>,
}

impl UnitRepository {
    /// 创建新的 UnitRepository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 行映射（列顺序对齐 UNIT_COLUMNS）
    fn map_row(row: &Row<'_>) -> SqliteResult<InventoryUnit> {
        let acquisition_raw: String = row.get(7)?;
        let acquisition_date = NaiveDate::parse_from_str(&acquisition_raw, "%Y-%m-%d")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        let created_raw: String = row.get(12)?;
        let created_at = created_raw.parse::<DateTime<Utc>>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let updated_raw: String = row.get(13)?;
        let updated_at = updated_raw.parse::<DateTime<Utc>>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(13, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(InventoryUnit {
            unit_id: row.get(0)?,
            product_id: row.get(1)?,
            location_code: row.get(2)?,
            batch_no: row.get(3)?,
            quantity_received: row.get(4)?,
            quantity_available: row.get(5)?,
            unit_cost: row.get(6)?,
            acquisition_date,
            warranty_expiry_date: row
                .get::<_, Option<String>>(8)?
                .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            // 未知评级按无评级处理（序数 0）
            performance_rating: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| PerformanceRating::from_str(&s)),
            failure_count: row.get(10)?,
            // 未知状态按不可用处理,绝不进入可分配集
            status: UnitStatus::from_str(&row.get::<_, String>(11)?)
                .unwrap_or(UnitStatus::Unavailable),
            created_at,
            updated_at,
            updated_by: row.get(14)?,
        })
    }

    /// 插入单元（种子/测试用;入库走 batch_upsert_units）
    pub fn insert_unit(&self, unit: &InventoryUnit) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO inventory_unit (
                unit_id, product_id, location_code, batch_no,
                quantity_received, quantity_available, unit_cost, acquisition_date,
                warranty_expiry_date, performance_rating, failure_count, status,
                created_at, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
            params![
                unit.unit_id,
                unit.product_id,
                unit.location_code,
                unit.batch_no,
                unit.quantity_received,
                unit.quantity_available,
                unit.unit_cost,
                unit.acquisition_date.format("%Y-%m-%d").to_string(),
                unit.warranty_expiry_date.map(|d| d.format("%Y-%m-%d").to_string()),
                unit.performance_rating.map(|r| r.to_db_str()),
                unit.failure_count,
                unit.status.to_db_str(),
                unit.created_at.to_rfc3339(),
                unit.updated_at.to_rfc3339(),
                unit.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 批量入库 upsert（导入管道用）
    ///
    /// # 说明
    /// - 新 unit_id: 整行插入
    /// - 已有 unit_id: 仅更新描述性字段（批次/成本/质保/评级/故障数）,
    ///   数量与状态只归预留协议管,导入不触碰
    /// - 单事务保证批次原子性
    ///
    /// # 返回
    /// - Ok((inserted, updated))
    pub fn batch_upsert_units(
        &self,
        units: &[InventoryUnit],
    ) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut inserted = 0;
        let mut updated = 0;
        {
            let mut exists_stmt =
                tx.prepare("SELECT 1 FROM inventory_unit WHERE unit_id = ?1")?;
            let mut insert_stmt = tx.prepare(
                r#"INSERT INTO inventory_unit (
                    unit_id, product_id, location_code, batch_no,
                    quantity_received, quantity_available, unit_cost, acquisition_date,
                    warranty_expiry_date, performance_rating, failure_count, status,
                    created_at, updated_at, updated_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"#,
            )?;
            let mut update_stmt = tx.prepare(
                r#"UPDATE inventory_unit
                   SET batch_no = ?2, unit_cost = ?3, warranty_expiry_date = ?4,
                       performance_rating = ?5, failure_count = ?6,
                       updated_at = ?7, updated_by = ?8
                   WHERE unit_id = ?1"#,
            )?;

            for unit in units {
                let exists = exists_stmt
                    .query_row(params![unit.unit_id], |_row| Ok(true))
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?
                    .unwrap_or(false);

                if exists {
                    update_stmt.execute(params![
                        unit.unit_id,
                        unit.batch_no,
                        unit.unit_cost,
                        unit.warranty_expiry_date.map(|d| d.format("%Y-%m-%d").to_string()),
                        unit.performance_rating.map(|r| r.to_db_str()),
                        unit.failure_count,
                        unit.updated_at.to_rfc3339(),
                        unit.updated_by,
                    ])?;
                    updated += 1;
                } else {
                    insert_stmt.execute(params![
                        unit.unit_id,
                        unit.product_id,
                        unit.location_code,
                        unit.batch_no,
                        unit.quantity_received,
                        unit.quantity_available,
                        unit.unit_cost,
                        unit.acquisition_date.format("%Y-%m-%d").to_string(),
                        unit.warranty_expiry_date.map(|d| d.format("%Y-%m-%d").to_string()),
                        unit.performance_rating.map(|r| r.to_db_str()),
                        unit.failure_count,
                        unit.status.to_db_str(),
                        unit.created_at.to_rfc3339(),
                        unit.updated_at.to_rfc3339(),
                        unit.updated_by,
                    ])?;
                    inserted += 1;
                }
            }
        }

        tx.commit()?;
        Ok((inserted, updated))
    }

    /// 按 unit_id 查询单元
    pub fn find_by_id(&self, unit_id: &str) -> RepositoryResult<Option<InventoryUnit>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM inventory_unit WHERE unit_id = ?1", UNIT_COLUMNS);

        match conn.query_row(&sql, params![unit_id], Self::map_row) {
            Ok(unit) => Ok(Some(unit)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    // ==========================================
    // 运维钩子（RMA/维修流程调用）
    // ==========================================

    /// 标记单元不可用（AVAILABLE → UNAVAILABLE）
    ///
    /// # 错误
    /// - `RepositoryError::InvalidStateTransition`: 单元不处于 AVAILABLE
    /// - `RepositoryError::NotFound`: unit_id 不存在
    pub fn mark_unavailable(&self, unit_id: &str, operator: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE inventory_unit
               SET status = 'UNAVAILABLE', updated_at = ?2, updated_by = ?3
               WHERE unit_id = ?1 AND status = 'AVAILABLE'"#,
            params![unit_id, Utc::now().to_rfc3339(), operator],
        )?;

        if rows_affected == 0 {
            // 区分“不存在”与“状态不允许”
            let actual: Result<String, _> = conn.query_row(
                "SELECT status FROM inventory_unit WHERE unit_id = ?1",
                params![unit_id],
                |row| row.get(0),
            );

            match actual {
                Ok(status) => {
                    return Err(RepositoryError::InvalidStateTransition {
                        from: status,
                        to: "UNAVAILABLE".to_string(),
                    });
                }
                Err(_) => {
                    return Err(RepositoryError::NotFound {
                        entity: "InventoryUnit".to_string(),
                        id: unit_id.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// 记录单元故障（failure_count += 1）
    pub fn record_failure(&self, unit_id: &str, operator: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE inventory_unit
               SET failure_count = failure_count + 1, updated_at = ?2, updated_by = ?3
               WHERE unit_id = ?1"#,
            params![unit_id, Utc::now().to_rfc3339(), operator],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InventoryUnit".to_string(),
                id: unit_id.to_string(),
            });
        }

        Ok(())
    }
}

// ==========================================
// InventoryPool 实现（分配引擎接口）
// ==========================================
impl InventoryPool for UnitRepository {
    fn list_available(
        &self,
        product_id: &str,
        location_code: Option<&str>,
    ) -> RepositoryResult<Vec<InventoryUnit>> {
        let conn = self.get_conn()?;

        match location_code {
            Some(loc) => {
                let sql = format!(
                    "SELECT {} FROM inventory_unit \
                     WHERE product_id = ?1 AND location_code = ?2 \
                       AND status = 'AVAILABLE' AND quantity_available > 0 \
                     ORDER BY unit_id",
                    UNIT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![product_id, loc], Self::map_row)?;
                Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM inventory_unit \
                     WHERE product_id = ?1 \
                       AND status = 'AVAILABLE' AND quantity_available > 0 \
                     ORDER BY unit_id",
                    UNIT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params![product_id], Self::map_row)?;
                Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
            }
        }
    }

    fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<InventoryUnit>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM inventory_unit WHERE product_id = ?1 ORDER BY unit_id",
            UNIT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![product_id], Self::map_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    fn get_unit(&self, unit_id: &str) -> RepositoryResult<Option<InventoryUnit>> {
        self.find_by_id(unit_id)
    }

    fn try_reserve(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<bool> {
        if quantity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "预留数量必须为正数: {}",
                quantity
            )));
        }

        let conn = self.get_conn()?;

        // 单条条件更新 = 原子预留;前置条件在 WHERE 里一次判定,
        // 并发抢占表现为 rows_affected == 0,由调用方按冲突处理
        let rows_affected = conn.execute(
            r#"UPDATE inventory_unit
               SET quantity_available = quantity_available - ?2,
                   status = CASE WHEN quantity_available - ?2 <= 0
                                 THEN 'RESERVED' ELSE status END,
                   updated_at = ?3,
                   updated_by = ?4
               WHERE unit_id = ?1
                 AND status = 'AVAILABLE'
                 AND quantity_available >= ?2"#,
            params![unit_id, quantity, Utc::now().to_rfc3339(), operator],
        )?;

        Ok(rows_affected == 1)
    }

    fn release(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<()> {
        if quantity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "释放数量必须为正数: {}",
                quantity
            )));
        }

        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE inventory_unit
               SET quantity_available = quantity_available + ?2,
                   status = CASE WHEN status = 'RESERVED'
                                 THEN 'AVAILABLE' ELSE status END,
                   updated_at = ?3,
                   updated_by = ?4
               WHERE unit_id = ?1"#,
            params![unit_id, quantity, Utc::now().to_rfc3339(), operator],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "InventoryUnit".to_string(),
                id: unit_id.to_string(),
            });
        }

        Ok(())
    }

    fn finalize_allocated(&self, unit_ids: &[String], operator: &str) -> RepositoryResult<usize> {
        if unit_ids.is_empty() {
            return Ok(0);
        }

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"UPDATE inventory_unit
                   SET status = 'ALLOCATED', updated_at = ?2, updated_by = ?3
                   WHERE unit_id = ?1 AND status = 'RESERVED' AND quantity_available = 0"#,
            )?;

            let now = Utc::now().to_rfc3339();
            for unit_id in unit_ids {
                count += stmt.execute(params![unit_id, now, operator])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }
}
