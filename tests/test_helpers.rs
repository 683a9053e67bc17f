// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use chrono::{Duration, Utc};
use inventory_alloc_engine::db;
use inventory_alloc_engine::domain::strategy::{AllocationRule, AllocationStrategy};
use inventory_alloc_engine::domain::types::{
    BusinessContext, CriteriaKind, CustomerTier, ProjectPriority, SortDirection, StrategyKind,
    UnitStatus,
};
use inventory_alloc_engine::domain::{AllocationRequest, InventoryUnit};
use std::error::Error;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 库存单元构造（默认: WH-01 / 30 天库龄 / 一年质保 / 无评级 / 零故障）
pub fn make_unit(unit_id: &str, product_id: &str, quantity: i64, unit_cost: f64) -> InventoryUnit {
    let today = Utc::now().date_naive();
    let now = Utc::now();
    InventoryUnit {
        unit_id: unit_id.to_string(),
        product_id: product_id.to_string(),
        location_code: "WH-01".to_string(),
        batch_no: Some("PO-TEST".to_string()),
        quantity_received: quantity,
        quantity_available: quantity,
        unit_cost,
        acquisition_date: today - Duration::days(30),
        warranty_expiry_date: Some(today + Duration::days(365)),
        performance_rating: None,
        failure_count: 0,
        status: UnitStatus::Available,
        created_at: now,
        updated_at: now,
        updated_by: Some("test".to_string()),
    }
}

/// 评分规则构造
pub fn make_rule(
    strategy_id: &str,
    criteria: CriteriaKind,
    direction: SortDirection,
    weight: f64,
    priority: i32,
) -> AllocationRule {
    let now = Utc::now();
    AllocationRule {
        rule_id: format!("{}-R{}", strategy_id, priority),
        strategy_id: strategy_id.to_string(),
        criteria,
        weight,
        direction,
        priority,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

/// 非默认策略构造
pub fn make_strategy(strategy_id: &str, rules: Vec<AllocationRule>) -> AllocationStrategy {
    let now = Utc::now();
    AllocationStrategy {
        strategy_id: strategy_id.to_string(),
        strategy_name: format!("策略-{}", strategy_id),
        kind: StrategyKind::Custom,
        description: None,
        is_active: true,
        is_default: false,
        default_context: None,
        rules,
        created_at: now,
        updated_at: now,
    }
}

/// 场景全局默认策略构造
pub fn make_default_strategy(
    strategy_id: &str,
    context: BusinessContext,
    rules: Vec<AllocationRule>,
) -> AllocationStrategy {
    let mut strategy = make_strategy(strategy_id, rules);
    strategy.is_default = true;
    strategy.default_context = Some(context);
    strategy
}

/// 标准分配请求构造（生产场景 / 普通客户 / 常规优先级 / 不限库位）
pub fn make_request(request_id: &str, product_id: &str, quantity: i64) -> AllocationRequest {
    AllocationRequest {
        request_id: request_id.to_string(),
        product_id: product_id.to_string(),
        quantity_needed: quantity,
        business_context: BusinessContext::Manufacturing,
        location_code: None,
        customer_tier: CustomerTier::Standard,
        project_priority: ProjectPriority::Normal,
        custom_strategy_id: None,
        category_id: None,
    }
}
