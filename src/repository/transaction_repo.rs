// ==========================================
// 库存分配引擎 - 分配事务仓储
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3.3 已提交分配事务
// 依据: ERP_Alloc_Core_Spec.md - 5. 并发契约 (超时重查口径)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::allocation::{AllocationTransaction, TransactionLine};
use crate::domain::types::{BusinessContext, StrategySource};
use crate::engine::pool::AllocationHistory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// allocation_transaction 表查询列
const TXN_COLUMNS: &str = "transaction_id, request_id, product_id, location_code, \
     business_context, strategy_id, strategy_source, quantity_requested, \
     quantity_allocated, total_cost, operator, config_snapshot_json, committed_at";

/// allocation_line 表查询列
const LINE_COLUMNS: &str =
    "line_id, transaction_id, seq, unit_id, quantity_allocated, unit_cost, score, reason";

// ==========================================
// TransactionRepository - 分配事务仓储
// ==========================================
/// 分配事务仓储
/// 职责: 已提交事务的落库与重查（预览不经此仓储）
pub struct TransactionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionRepository {
    /// 创建新的 TransactionRepository 实例
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

    fn conversion_err(idx: usize, message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            Box::<dyn std::error::Error + Send + Sync>::from(message),
        )
    }

    /// 事务头行映射（历史记录要求严格解析,损坏即报错而非默认值兜底）
    fn map_txn_row(row: &Row<'_>) -> SqliteResult<AllocationTransaction> {
        let context_raw: String = row.get(4)?;
        let business_context = BusinessContext::from_str(&context_raw)
            .ok_or_else(|| Self::conversion_err(4, format!("未知业务场景: {}", context_raw)))?;

        let source_raw: String = row.get(6)?;
        let strategy_source = StrategySource::from_str(&source_raw)
            .ok_or_else(|| Self::conversion_err(6, format!("未知策略来源: {}", source_raw)))?;

        let committed_raw: String = row.get(12)?;
        let committed_at = committed_raw
            .parse::<DateTime<Utc>>()
            .map_err(|e| Self::conversion_err(12, e.to_string()))?;

        Ok(AllocationTransaction {
            transaction_id: row.get(0)?,
            request_id: row.get(1)?,
            product_id: row.get(2)?,
            location_code: row.get(3)?,
            business_context,
            strategy_id: row.get(5)?,
            strategy_source,
            quantity_requested: row.get(7)?,
            quantity_allocated: row.get(8)?,
            total_cost: row.get(9)?,
            operator: row.get(10)?,
            config_snapshot_json: row.get(11)?,
            committed_at,
        })
    }

    /// 明细行映射
    fn map_line_row(row: &Row<'_>) -> SqliteResult<TransactionLine> {
        Ok(TransactionLine {
            line_id: row.get(0)?,
            transaction_id: row.get(1)?,
            seq: row.get(2)?,
            unit_id: row.get(3)?,
            quantity_allocated: row.get(4)?,
            unit_cost: row.get(5)?,
            score: row.get(6)?,
            reason: row.get(7)?,
        })
    }

    /// 按 transaction_id 重查（头 + 明细,按 seq 升序）
    ///
    /// # 用途
    /// 执行结果未知（超时/断连）时的重查口径:查到即已提交,查不到即未提交
    pub fn find_by_id(
        &self,
        transaction_id: &str,
    ) -> RepositoryResult<Option<(AllocationTransaction, Vec<TransactionLine>)>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_transaction WHERE transaction_id = ?1",
            TXN_COLUMNS
        );

        let txn = match conn.query_row(&sql, params![transaction_id], Self::map_txn_row) {
            Ok(t) => t,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let line_sql = format!(
            "SELECT {} FROM allocation_line WHERE transaction_id = ?1 ORDER BY seq",
            LINE_COLUMNS
        );
        let mut stmt = conn.prepare(&line_sql)?;
        let rows = stmt.query_map(params![transaction_id], Self::map_line_row)?;
        let lines = rows.collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some((txn, lines)))
    }

    /// 按 request_id 查询已提交事务（调用方超时后若未拿到 transaction_id 的重查口径）
    pub fn find_by_request(
        &self,
        request_id: &str,
    ) -> RepositoryResult<Vec<AllocationTransaction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_transaction \
             WHERE request_id = ?1 ORDER BY committed_at, transaction_id",
            TXN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![request_id], Self::map_txn_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }

    /// 最近提交的事务（运维巡检用）
    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<AllocationTransaction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_transaction \
             ORDER BY committed_at DESC, transaction_id LIMIT ?1",
            TXN_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], Self::map_txn_row)?;
        Ok(rows.collect::<SqliteResult<Vec<_>>>()?)
    }
}

// ==========================================
// AllocationHistory 实现（提交落库,单事务）
// ==========================================
impl AllocationHistory for TransactionRepository {
    fn record(
        &self,
        txn: &AllocationTransaction,
        lines: &[TransactionLine],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"INSERT INTO allocation_transaction (
                transaction_id, request_id, product_id, location_code,
                business_context, strategy_id, strategy_source, quantity_requested,
                quantity_allocated, total_cost, operator, config_snapshot_json, committed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
            params![
                txn.transaction_id,
                txn.request_id,
                txn.product_id,
                txn.location_code,
                txn.business_context.to_db_str(),
                txn.strategy_id,
                txn.strategy_source.to_db_str(),
                txn.quantity_requested,
                txn.quantity_allocated,
                txn.total_cost,
                txn.operator,
                txn.config_snapshot_json,
                txn.committed_at.to_rfc3339(),
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO allocation_line (
                    line_id, transaction_id, seq, unit_id,
                    quantity_allocated, unit_cost, score, reason
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
            )?;

            for line in lines {
                stmt.execute(params![
                    line.line_id,
                    line.transaction_id,
                    line.seq,
                    line.unit_id,
                    line.quantity_allocated,
                    line.unit_cost,
                    line.score,
                    line.reason,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
