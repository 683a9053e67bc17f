// ==========================================
// 库存分配引擎 - 演示数据种子工具
// ==========================================
// 用法: cargo run --bin seed_demo_inventory [db_path]
// 职责: 建库 → 种入策略/偏好 → 导入演示库存 → 演示预览与执行
// ==========================================

use chrono::{Duration, NaiveDate, Utc};
use inventory_alloc_engine::domain::strategy::{
    AllocationPreference, AllocationRule, AllocationStrategy,
};
use inventory_alloc_engine::domain::types::{
    BusinessContext, CriteriaKind, CustomerTier, PreferenceScopeKind, ProjectPriority,
    SortDirection, StrategyKind,
};
use inventory_alloc_engine::domain::{
    AllocationPlan, AllocationRequest, ManualPick, ManualSelection,
};
use inventory_alloc_engine::i18n::t_with_args;
use inventory_alloc_engine::{logging, AllocationApi};
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    info!("==================================================");
    info!("{} - 演示数据种子工具", inventory_alloc_engine::APP_NAME);
    info!("系统版本: {}", inventory_alloc_engine::VERSION);
    info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demo_inventory.db".to_string());
    // 每次运行重建演示库
    let _ = std::fs::remove_file(&db_path);
    info!("使用数据库: {}", db_path);

    let api = AllocationApi::open(&db_path)?;

    seed_strategies(&api)?;
    seed_inventory(&api).await?;

    run_manufacturing_demo(&api)?;
    run_premium_demo(&api)?;
    run_manual_demo(&api)?;

    info!("演示完成,数据库保留在 {}", db_path);
    Ok(())
}

// ==========================================
// 策略与偏好
// ==========================================

fn rule(
    strategy_id: &str,
    criteria: CriteriaKind,
    direction: SortDirection,
    weight: f64,
    priority: i32,
) -> AllocationRule {
    let now = Utc::now();
    AllocationRule {
        rule_id: Uuid::new_v4().to_string(),
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

fn strategy(
    strategy_id: &str,
    strategy_name: &str,
    kind: StrategyKind,
    default_context: Option<BusinessContext>,
    rules: Vec<AllocationRule>,
) -> AllocationStrategy {
    let now = Utc::now();
    AllocationStrategy {
        strategy_id: strategy_id.to_string(),
        strategy_name: strategy_name.to_string(),
        kind,
        description: None,
        is_active: true,
        is_default: default_context.is_some(),
        default_context,
        rules,
        created_at: now,
        updated_at: now,
    }
}

fn seed_strategies(api: &AllocationApi) -> anyhow::Result<()> {
    info!("种入演示策略与偏好");

    api.save_strategy(&strategy(
        "STRAT-COST",
        "成本优先",
        StrategyKind::CostOptimization,
        Some(BusinessContext::Manufacturing),
        vec![
            rule("STRAT-COST", CriteriaKind::UnitCost, SortDirection::Asc, 2.0, 1),
            rule("STRAT-COST", CriteriaKind::AgeDays, SortDirection::Desc, 1.0, 2),
        ],
    ))?;

    api.save_strategy(&strategy(
        "STRAT-FIFO",
        "先进先出",
        StrategyKind::InventoryRotation,
        Some(BusinessContext::Sales),
        vec![
            rule("STRAT-FIFO", CriteriaKind::AgeDays, SortDirection::Desc, 2.0, 1),
            rule(
                "STRAT-FIFO",
                CriteriaKind::WarrantyRemainingDays,
                SortDirection::Desc,
                0.5,
                2,
            ),
        ],
    ))?;

    api.save_strategy(&strategy(
        "STRAT-PREMIUM",
        "高端客户保障",
        StrategyKind::Custom,
        None,
        vec![
            rule(
                "STRAT-PREMIUM",
                CriteriaKind::PerformanceRating,
                SortDirection::Desc,
                2.0,
                1,
            ),
            rule(
                "STRAT-PREMIUM",
                CriteriaKind::WarrantyRemainingDays,
                SortDirection::Desc,
                1.5,
                2,
            ),
            rule(
                "STRAT-PREMIUM",
                CriteriaKind::FailureCount,
                SortDirection::Asc,
                1.0,
                3,
            ),
        ],
    ))?;

    api.save_strategy(&strategy(
        "STRAT-QUALITY",
        "高货值稳妥",
        StrategyKind::WarrantyOptimization,
        None,
        vec![
            rule(
                "STRAT-QUALITY",
                CriteriaKind::WarrantyRemainingDays,
                SortDirection::Desc,
                2.0,
                1,
            ),
            rule(
                "STRAT-QUALITY",
                CriteriaKind::FailureCount,
                SortDirection::Asc,
                1.0,
                2,
            ),
        ],
    ))?;

    // 产品级偏好: 高端客户与高货值单走专属策略,其余场景落到全局默认
    let now = Utc::now();
    api.save_preference(&AllocationPreference {
        preference_id: Uuid::new_v4().to_string(),
        scope_kind: PreferenceScopeKind::Product,
        scope_id: "P-1001".to_string(),
        premium_customer_strategy_id: Some("STRAT-PREMIUM".to_string()),
        high_value_strategy_id: Some("STRAT-QUALITY".to_string()),
        high_value_threshold: Some(50_000.0),
        critical_project_strategy_id: None,
        default_strategy_id: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    })?;

    Ok(())
}

// ==========================================
// 演示库存（走正式导入通道）
// ==========================================

async fn seed_inventory(api: &AllocationApi) -> anyhow::Result<()> {
    let today = Utc::now().date_naive();
    let d = |days: i64| fmt_date(today + Duration::days(days));

    let mut csv = String::from(
        "unit_id,product_id,location_code,batch_no,quantity_received,unit_cost,acquisition_date,warranty_expiry_date,performance_rating,failure_count\n",
    );
    // P-1001: 成本/库龄/质保/评级差异化的六个单元
    csv.push_str(&format!(
        "SRV-1001-A,P-1001,WH-01,PO-2026-031,4,98.50,{},{},GOOD,0\n",
        d(-220),
        d(320)
    ));
    csv.push_str(&format!(
        "SRV-1001-B,P-1001,WH-01,PO-2026-031,3,95.00,{},{},AVERAGE,1\n",
        d(-365),
        d(35)
    ));
    csv.push_str(&format!(
        "SRV-1001-C,P-1001,WH-01,PO-2026-047,5,112.00,{},{},EXCELLENT,0\n",
        d(-90),
        d(540)
    ));
    csv.push_str(&format!(
        "SRV-1001-D,P-1001,WH-02,PO-2026-047,2,105.00,{},{},GOOD,4\n",
        d(-150),
        d(400)
    ));
    csv.push_str(&format!(
        "SRV-1001-E,P-1001,WH-02,PO-2026-052,6,131.00,{},{},EXCELLENT,0\n",
        d(-30),
        d(700)
    ));
    csv.push_str(&format!(
        "SRV-1001-F,P-1001,WH-01,PO-2026-052,1,89.00,{},,POOR,2\n",
        d(-400)
    ));
    // P-2002: 人工路径演示用
    csv.push_str(&format!(
        "SRV-2002-A,P-2002,WH-02,PO-2026-060,2,450.00,{},{},GOOD,0\n",
        d(-60),
        d(600)
    ));
    csv.push_str(&format!(
        "SRV-2002-B,P-2002,WH-02,PO-2026-060,2,438.00,{},{},GOOD,1\n",
        d(-45),
        d(620)
    ));
    csv.push_str(&format!(
        "SRV-2002-C,P-2002,WH-02,PO-2026-068,3,460.00,{},{},EXCELLENT,0\n",
        d(-10),
        d(720)
    ));
    // 故意放一行坏数据,演示 DQ 阻断
    csv.push_str(&format!(
        "SRV-2002-X,P-2002,WH-02,PO-2026-068,-1,460.00,{},,GOOD,0\n",
        d(-10)
    ));

    let csv_path = std::env::temp_dir().join("demo_intake.csv");
    std::fs::write(&csv_path, csv)?;

    let outcome = api.import_units(&csv_path, "seed-demo").await?;
    println!(
        "\n{}",
        t_with_args(
            "import.summary",
            &[
                ("inserted", &outcome.inserted.to_string()),
                ("updated", &outcome.updated.to_string()),
                ("rejected", &outcome.summary.rejected.to_string()),
            ],
        )
    );
    for violation in &outcome.violations {
        println!(
            "  [{:?}] 行 {} 字段 {}: {}",
            violation.level, violation.row_number, violation.field, violation.message
        );
    }
    Ok(())
}

// ==========================================
// 演示场景
// ==========================================

fn run_manufacturing_demo(api: &AllocationApi) -> anyhow::Result<()> {
    // 普通客户生产领用: 产品偏好无可用子规则,级联落到场景全局默认
    let request = AllocationRequest {
        request_id: format!("WO-{}", short_id()),
        product_id: "P-1001".to_string(),
        quantity_needed: 5,
        business_context: BusinessContext::Manufacturing,
        location_code: None,
        customer_tier: CustomerTier::Standard,
        project_priority: ProjectPriority::Normal,
        custom_strategy_id: None,
        category_id: None,
    };

    let preview = api.get_preview(&request)?;
    print_plan("生产领用 - 预览", &preview);

    let executed = api.execute(&request, Some("seed-demo"))?;
    print_plan("生产领用 - 执行", &executed);

    if let Some(txn_id) = &executed.transaction_id {
        if let Some(detail) = api.get_transaction(txn_id)? {
            info!(
                transaction_id = %detail.transaction.transaction_id,
                lines = detail.lines.len(),
                "事务落库核验通过"
            );
        }
    }
    Ok(())
}

fn run_premium_demo(api: &AllocationApi) -> anyhow::Result<()> {
    // 高端客户: 命中产品偏好的高端客户子规则
    let request = AllocationRequest {
        request_id: format!("SO-{}", short_id()),
        product_id: "P-1001".to_string(),
        quantity_needed: 3,
        business_context: BusinessContext::Sales,
        location_code: None,
        customer_tier: CustomerTier::Premium,
        project_priority: ProjectPriority::High,
        custom_strategy_id: None,
        category_id: None,
    };

    let preview = api.get_preview(&request)?;
    print_plan("高端客户发货 - 预览", &preview);
    Ok(())
}

fn run_manual_demo(api: &AllocationApi) -> anyhow::Result<()> {
    // 人工越权: 指定单元,绕过评分,走同一提交协议
    let selection = ManualSelection {
        request_id: format!("WO-{}", short_id()),
        product_id: "P-2002".to_string(),
        location_code: "WH-02".to_string(),
        quantity_needed: 3,
        business_context: BusinessContext::Manufacturing,
        picks: vec![
            ManualPick {
                unit_id: "SRV-2002-B".to_string(),
                quantity: 2,
                reason: Some("客户指定批次".to_string()),
            },
            ManualPick {
                unit_id: "SRV-2002-A".to_string(),
                quantity: 1,
                reason: None,
            },
        ],
        operator: "seed-demo".to_string(),
    };

    let plan = api.execute_manual(&selection)?;
    print_plan("人工指定 - 执行", &plan);
    Ok(())
}

// ==========================================
// 输出辅助
// ==========================================

fn print_plan(title: &str, plan: &AllocationPlan) {
    println!("\n=== {} ===", title);
    println!(
        "请求 {} | 产品 {} | 策略 {} | 来源 {}",
        plan.request_id,
        plan.product_id,
        plan.strategy_name.as_deref().unwrap_or("-"),
        plan.strategy_source
    );
    println!(
        "{:<4} {:<14} {:>6} {:>10} {:>8}  {}",
        "序", "单元", "数量", "单价", "得分", "理由"
    );
    for line in &plan.lines {
        let score = line
            .score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<4} {:<14} {:>6} {:>10.2} {:>8}  {}",
            line.seq, line.unit_id, line.quantity_allocated, line.unit_cost, score, line.reason
        );
    }
    println!(
        "合计: 数量 {} | 成本 {:.2} | 均价 {:.2}",
        plan.quantity_allocated, plan.total_cost, plan.average_unit_cost
    );
    for rec in &plan.recommendations {
        println!("建议: {}", rec);
    }
    if let Some(txn_id) = &plan.transaction_id {
        println!("事务: {}", txn_id);
    }
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}
