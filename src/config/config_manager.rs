// ==========================================
// 库存分配引擎 - 配置管理器
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 6. 建议项阈值 / 8. 环境与配置
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (scope_id + key + value)
// ==========================================

use crate::db::open_sqlite_connection;
use crate::engine::AllocatorKnobs;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&guard)?;
        }

        Ok(Self { conn })
    }

    fn lock_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.lock_conn()?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    // ===== 建议项阈值 =====

    /// 质保剩余天数告警阈值（天，默认 90）
    pub fn get_warranty_warning_days(&self) -> RepositoryResult<i64> {
        let value = self.get_config_or_default(config_keys::WARRANTY_WARNING_DAYS, "90")?;
        Ok(value.parse::<i64>().unwrap_or(90))
    }

    /// 方案均价高出可用均值的告警百分比（%，默认 15）
    pub fn get_cost_over_avg_warn_pct(&self) -> RepositoryResult<f64> {
        let value = self.get_config_or_default(config_keys::COST_OVER_AVG_WARN_PCT, "15.0")?;
        Ok(value.parse::<f64>().unwrap_or(15.0))
    }

    /// 历史故障次数告警阈值（次，默认 3）
    pub fn get_failure_count_warn(&self) -> RepositoryResult<i64> {
        let value = self.get_config_or_default(config_keys::FAILURE_COUNT_WARN, "3")?;
        Ok(value.parse::<i64>().unwrap_or(3))
    }

    /// 默认操作员标识（调用方未传 operator 时落痕用，默认 "system"）
    pub fn get_default_operator(&self) -> RepositoryResult<String> {
        self.get_config_or_default(config_keys::DEFAULT_OPERATOR, "system")
    }

    /// 组装引擎阈值配置（缺省项按默认值补齐）
    pub fn allocator_knobs(&self) -> RepositoryResult<AllocatorKnobs> {
        Ok(AllocatorKnobs {
            warranty_warning_days: self.get_warranty_warning_days()?,
            cost_over_avg_warn_pct: self.get_cost_over_avg_warn_pct()?,
            failure_count_warn: self.get_failure_count_warn()?,
        })
    }

    /// 获取 global 配置全量快照（JSON 格式，键有序）
    ///
    /// # 用途
    /// - 管理界面展示当前生效配置
    /// - 运维导出留存
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.lock_conn()?;

        let mut stmt = conn
            .prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        serde_json::to_string(&json_value)
            .map_err(|e| RepositoryError::ValidationError(format!("配置快照序列化失败: {}", e)))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 建议项阈值
    pub const WARRANTY_WARNING_DAYS: &str = "warranty_warning_days";
    pub const COST_OVER_AVG_WARN_PCT: &str = "cost_over_avg_warn_pct";
    pub const FAILURE_COUNT_WARN: &str = "failure_count_warn";

    // 操作员
    pub const DEFAULT_OPERATOR: &str = "default_operator";
}
