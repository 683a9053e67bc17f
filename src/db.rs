// ==========================================
// 库存分配引擎 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表 DDL 集中于此，生产入口/种子程序/测试共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
///
/// 说明：
/// - 版本号用于**提示/告警**（不做自动迁移），避免静默在旧库上运行导致隐性错误。
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化分配域全量建表（幂等，IF NOT EXISTS）
///
/// 依据: ERP_Alloc_Core_Spec.md - 3. 数据模型
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- 库存单元（同一批次/库位/成本的可分配库存行）
        CREATE TABLE IF NOT EXISTS inventory_unit (
            unit_id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL,
            location_code TEXT NOT NULL,
            batch_no TEXT,
            quantity_received INTEGER NOT NULL,
            quantity_available INTEGER NOT NULL,
            unit_cost REAL NOT NULL,
            acquisition_date TEXT NOT NULL,
            warranty_expiry_date TEXT,
            performance_rating TEXT,
            failure_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'AVAILABLE',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            updated_by TEXT,
            CHECK (quantity_available >= 0),
            CHECK (quantity_received >= quantity_available)
        );
        CREATE INDEX IF NOT EXISTS idx_unit_product_loc_status
            ON inventory_unit (product_id, location_code, status);

        -- 分配策略
        CREATE TABLE IF NOT EXISTS allocation_strategy (
            strategy_id TEXT PRIMARY KEY,
            strategy_name TEXT NOT NULL,
            strategy_kind TEXT NOT NULL,
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_default INTEGER NOT NULL DEFAULT 0,
            default_context TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_strategy_default_context
            ON allocation_strategy (default_context)
            WHERE is_default = 1 AND default_context IS NOT NULL;

        -- 策略评分规则（每策略每准则至多一条）
        CREATE TABLE IF NOT EXISTS allocation_rule (
            rule_id TEXT PRIMARY KEY,
            strategy_id TEXT NOT NULL,
            criteria TEXT NOT NULL,
            weight REAL NOT NULL CHECK (weight >= 0.1 AND weight <= 5.0),
            direction TEXT NOT NULL,
            priority INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (strategy_id, criteria),
            FOREIGN KEY (strategy_id) REFERENCES allocation_strategy (strategy_id)
                ON DELETE CASCADE
        );

        -- 分配偏好（产品/品类两级作用域）
        CREATE TABLE IF NOT EXISTS allocation_preference (
            preference_id TEXT PRIMARY KEY,
            scope_kind TEXT NOT NULL,
            scope_id TEXT NOT NULL,
            premium_customer_strategy_id TEXT,
            high_value_strategy_id TEXT,
            high_value_threshold REAL,
            critical_project_strategy_id TEXT,
            default_strategy_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (scope_kind, scope_id),
            FOREIGN KEY (premium_customer_strategy_id) REFERENCES allocation_strategy (strategy_id),
            FOREIGN KEY (high_value_strategy_id) REFERENCES allocation_strategy (strategy_id),
            FOREIGN KEY (critical_project_strategy_id) REFERENCES allocation_strategy (strategy_id),
            FOREIGN KEY (default_strategy_id) REFERENCES allocation_strategy (strategy_id)
        );

        -- 已提交分配事务（执行成功后落库，预览不落库）
        CREATE TABLE IF NOT EXISTS allocation_transaction (
            transaction_id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL,
            product_id TEXT NOT NULL,
            location_code TEXT NOT NULL,
            business_context TEXT NOT NULL,
            strategy_id TEXT,
            strategy_source TEXT NOT NULL,
            quantity_requested INTEGER NOT NULL,
            quantity_allocated INTEGER NOT NULL,
            total_cost REAL NOT NULL,
            operator TEXT NOT NULL,
            config_snapshot_json TEXT,
            committed_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_txn_request ON allocation_transaction (request_id);
        CREATE INDEX IF NOT EXISTS idx_txn_product ON allocation_transaction (product_id);

        -- 分配事务明细行
        CREATE TABLE IF NOT EXISTS allocation_line (
            line_id TEXT PRIMARY KEY,
            transaction_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            unit_id TEXT NOT NULL,
            quantity_allocated INTEGER NOT NULL,
            unit_cost REAL NOT NULL,
            score REAL,
            reason TEXT,
            UNIQUE (transaction_id, seq),
            FOREIGN KEY (transaction_id) REFERENCES allocation_transaction (transaction_id)
                ON DELETE CASCADE,
            FOREIGN KEY (unit_id) REFERENCES inventory_unit (unit_id)
        );

        -- 配置表 (key-value + scope)
        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (scope_id, key)
        );

        -- schema 版本标记
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
