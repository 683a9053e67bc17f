// ==========================================
// 库存分配引擎 - 分配偏好仓储
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.1 策略解析级联 (第 2/3 级)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::strategy::AllocationPreference;
use crate::domain::types::PreferenceScopeKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// allocation_preference 表查询列
const PREFERENCE_COLUMNS: &str = "preference_id, scope_kind, scope_id, \
     premium_customer_strategy_id, high_value_strategy_id, high_value_threshold, \
     critical_project_strategy_id, default_strategy_id, is_active, created_at, updated_at";

// ==========================================
// PreferenceRepository - 分配偏好仓储
// ==========================================
/// 分配偏好仓储
/// 职责: allocation_preference 表的作用域查询与写入
pub struct PreferenceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PreferenceRepository {
    /// 创建新的 PreferenceRepository 实例
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

    /// 行映射
    fn map_row(row: &Row<'_>) -> SqliteResult<AllocationPreference> {
        Ok(AllocationPreference {
            preference_id: row.get(0)?,
            scope_kind: PreferenceScopeKind::from_str(&row.get::<_, String>(1)?)
                .unwrap_or(PreferenceScopeKind::Product),
            scope_id: row.get(2)?,
            premium_customer_strategy_id: row.get(3)?,
            high_value_strategy_id: row.get(4)?,
            high_value_threshold: row.get(5)?,
            critical_project_strategy_id: row.get(6)?,
            default_strategy_id: row.get(7)?,
            is_active: row.get::<_, i32>(8)? != 0,
            created_at: row
                .get::<_, String>(9)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            updated_at: row
                .get::<_, String>(10)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    /// 写入/覆盖偏好（按作用域唯一）
    pub fn upsert_preference(&self, pref: &AllocationPreference) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO allocation_preference (
                preference_id, scope_kind, scope_id,
                premium_customer_strategy_id, high_value_strategy_id, high_value_threshold,
                critical_project_strategy_id, default_strategy_id,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(scope_kind, scope_id) DO UPDATE SET
                premium_customer_strategy_id = excluded.premium_customer_strategy_id,
                high_value_strategy_id = excluded.high_value_strategy_id,
                high_value_threshold = excluded.high_value_threshold,
                critical_project_strategy_id = excluded.critical_project_strategy_id,
                default_strategy_id = excluded.default_strategy_id,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at"#,
            params![
                pref.preference_id,
                pref.scope_kind.to_db_str(),
                pref.scope_id,
                pref.premium_customer_strategy_id,
                pref.high_value_strategy_id,
                pref.high_value_threshold,
                pref.critical_project_strategy_id,
                pref.default_strategy_id,
                pref.is_active as i32,
                pref.created_at.to_rfc3339(),
                pref.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// 查询产品级偏好（仅启用）
    pub fn find_for_product(&self, product_id: &str) -> RepositoryResult<Option<AllocationPreference>> {
        self.find_by_scope(PreferenceScopeKind::Product, product_id)
    }

    /// 查询品类级偏好（仅启用）
    pub fn find_for_category(
        &self,
        category_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>> {
        self.find_by_scope(PreferenceScopeKind::Category, category_id)
    }

    fn find_by_scope(
        &self,
        scope_kind: PreferenceScopeKind,
        scope_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_preference \
             WHERE scope_kind = ?1 AND scope_id = ?2 AND is_active = 1",
            PREFERENCE_COLUMNS
        );

        match conn.query_row(&sql, params![scope_kind.to_db_str(), scope_id], Self::map_row) {
            Ok(pref) => Ok(Some(pref)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
