// ==========================================
// 库存分配引擎 - 分配策略仓储
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3.2 策略与规则
// ==========================================
// 红线: 读取即快照;规则按 priority 升序装载
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::strategy::{AllocationRule, AllocationStrategy};
use crate::domain::types::{BusinessContext, CriteriaKind, SortDirection, StrategyKind};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// allocation_strategy 表查询列
const STRATEGY_COLUMNS: &str = "strategy_id, strategy_name, strategy_kind, description, \
     is_active, is_default, default_context, created_at, updated_at";

/// allocation_rule 表查询列
const RULE_COLUMNS: &str = "rule_id, strategy_id, criteria, weight, direction, priority, \
     is_active, created_at, updated_at";

// ==========================================
// StrategyRepository - 分配策略仓储
// ==========================================
/// 分配策略仓储
/// 职责: allocation_strategy / allocation_rule 两表的装载与写入
pub struct StrategyRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StrategyRepository {
    /// 创建新的 StrategyRepository 实例
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

    fn parse_utc(idx: usize, raw: String) -> SqliteResult<DateTime<Utc>> {
        raw.parse::<DateTime<Utc>>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    /// 策略行映射（规则另行装载）
    fn map_strategy_row(row: &Row<'_>) -> SqliteResult<AllocationStrategy> {
        Ok(AllocationStrategy {
            strategy_id: row.get(0)?,
            strategy_name: row.get(1)?,
            // 未知类型按自定义处理（kind 仅作展示,评分由规则驱动）
            kind: StrategyKind::from_str(&row.get::<_, String>(2)?)
                .unwrap_or(StrategyKind::Custom),
            description: row.get(3)?,
            is_active: row.get::<_, i32>(4)? != 0,
            is_default: row.get::<_, i32>(5)? != 0,
            default_context: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| BusinessContext::from_str(&s)),
            rules: Vec::new(),
            created_at: Self::parse_utc(7, row.get(7)?)?,
            updated_at: Self::parse_utc(8, row.get(8)?)?,
        })
    }

    /// 装载某策略的规则（priority 升序;未知准则行跳过并告警）
    fn load_rules(conn: &Connection, strategy_id: &str) -> RepositoryResult<Vec<AllocationRule>> {
        let sql = format!(
            "SELECT {} FROM allocation_rule WHERE strategy_id = ?1 ORDER BY priority, criteria",
            RULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;

        // 先取原始字符串,再做枚举解析,便于对未知准则做跳过而非整批失败
        let raw_rows = stmt.query_map(params![strategy_id], |row| {
            Ok((
                row.get::<_, String>(0)?,         // rule_id
                row.get::<_, String>(1)?,         // strategy_id
                row.get::<_, String>(2)?,         // criteria
                row.get::<_, f64>(3)?,            // weight
                row.get::<_, String>(4)?,         // direction
                row.get::<_, i32>(5)?,            // priority
                row.get::<_, i32>(6)? != 0,       // is_active
                row.get::<_, String>(7)?,         // created_at
                row.get::<_, String>(8)?,         // updated_at
            ))
        })?;

        let mut rules = Vec::new();
        for raw in raw_rows {
            let (rule_id, strategy_id, criteria_raw, weight, direction_raw, priority, is_active, created_raw, updated_raw) = raw?;

            let criteria = match CriteriaKind::from_str(&criteria_raw) {
                Some(c) => c,
                None => {
                    tracing::warn!(
                        rule_id = %rule_id,
                        criteria = %criteria_raw,
                        "未知评分准则,跳过该规则"
                    );
                    continue;
                }
            };

            rules.push(AllocationRule {
                rule_id,
                strategy_id,
                criteria,
                weight,
                direction: SortDirection::from_str(&direction_raw).unwrap_or(SortDirection::Asc),
                priority,
                is_active,
                created_at: created_raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
                updated_at: updated_raw.parse::<DateTime<Utc>>().unwrap_or_else(|_| Utc::now()),
            });
        }

        Ok(rules)
    }

    /// 写入/覆盖策略（头 + 规则,单事务）
    ///
    /// # 说明
    /// - 先做结构校验（权重范围 + 准则唯一）
    /// - 规则采用整组重写（删旧插新）,与读取口径对齐
    pub fn upsert_strategy(&self, strategy: &AllocationStrategy) -> RepositoryResult<()> {
        strategy
            .validate()
            .map_err(RepositoryError::ValidationError)?;

        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"INSERT INTO allocation_strategy (
                strategy_id, strategy_name, strategy_kind, description,
                is_active, is_default, default_context, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(strategy_id) DO UPDATE SET
                strategy_name = excluded.strategy_name,
                strategy_kind = excluded.strategy_kind,
                description = excluded.description,
                is_active = excluded.is_active,
                is_default = excluded.is_default,
                default_context = excluded.default_context,
                updated_at = excluded.updated_at"#,
            params![
                strategy.strategy_id,
                strategy.strategy_name,
                strategy.kind.to_db_str(),
                strategy.description,
                strategy.is_active as i32,
                strategy.is_default as i32,
                strategy.default_context.map(|c| c.to_db_str()),
                strategy.created_at.to_rfc3339(),
                strategy.updated_at.to_rfc3339(),
            ],
        )?;

        tx.execute(
            "DELETE FROM allocation_rule WHERE strategy_id = ?1",
            params![strategy.strategy_id],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"INSERT INTO allocation_rule (
                    rule_id, strategy_id, criteria, weight, direction, priority,
                    is_active, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
            )?;

            for rule in &strategy.rules {
                stmt.execute(params![
                    rule.rule_id,
                    strategy.strategy_id,
                    rule.criteria.to_db_str(),
                    rule.weight,
                    rule.direction.to_db_str(),
                    rule.priority,
                    rule.is_active as i32,
                    rule.created_at.to_rfc3339(),
                    rule.updated_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// 按 strategy_id 查询（含规则）
    pub fn find_by_id(&self, strategy_id: &str) -> RepositoryResult<Option<AllocationStrategy>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_strategy WHERE strategy_id = ?1",
            STRATEGY_COLUMNS
        );

        let mut strategy = match conn.query_row(&sql, params![strategy_id], Self::map_strategy_row)
        {
            Ok(s) => s,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        strategy.rules = Self::load_rules(&conn, &strategy.strategy_id)?;
        Ok(Some(strategy))
    }

    /// 查询某业务场景的全局默认策略（启用的 is_default 且场景匹配）
    pub fn find_default_for_context(
        &self,
        context: BusinessContext,
    ) -> RepositoryResult<Option<AllocationStrategy>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_strategy \
             WHERE is_default = 1 AND default_context = ?1 AND is_active = 1 \
             ORDER BY strategy_id LIMIT 1",
            STRATEGY_COLUMNS
        );

        let mut strategy = match conn.query_row(&sql, params![context.to_db_str()], Self::map_strategy_row)
        {
            Ok(s) => s,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        strategy.rules = Self::load_rules(&conn, &strategy.strategy_id)?;
        Ok(Some(strategy))
    }

    /// 列出全部策略（含规则,strategy_id 升序;UI 下拉/运维巡检用）
    pub fn list_all(&self) -> RepositoryResult<Vec<AllocationStrategy>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM allocation_strategy ORDER BY strategy_id",
            STRATEGY_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_strategy_row)?;
        let mut strategies = rows.collect::<SqliteResult<Vec<_>>>()?;

        for strategy in &mut strategies {
            strategy.rules = Self::load_rules(&conn, &strategy.strategy_id)?;
        }

        Ok(strategies)
    }
}
