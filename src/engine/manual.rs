// ==========================================
// 库存分配引擎 - 人工指定通道
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.6 人工指定
// 红线: 人工路径跳过评分,但绝不跳过校验与预留协议
// ==========================================
// 职责: 逐行校验操作员选择 → 构建方案 → 走统一提交协议
// 输入: ManualSelection
// 输出: AllocationPlan (strategy_source=MANUAL,无评分)
// ==========================================

use crate::domain::allocation::{AllocationPlan, ManualSelection, PlanLine};
use crate::domain::types::{StrategySource, UnitStatus};
use crate::engine::allocator::commit_plan;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::pool::{AllocationHistory, InventoryPool};
use crate::i18n::{t, t_with_args};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};

pub struct ManualAllocator {
    pool: Arc<dyn InventoryPool>,
    history: Arc<dyn AllocationHistory>,
}

impl ManualAllocator {
    pub fn new(pool: Arc<dyn InventoryPool>, history: Arc<dyn AllocationHistory>) -> Self {
        Self { pool, history }
    }

    /// 校验操作员选择并提交
    ///
    /// # 失败语义
    /// - 任一行校验失败: 整单拒绝,库存无任何变化
    /// - `SelectionIncomplete`: Σ选择数量 ≠ 需求数量(多选少选都算)
    /// - `AllocationConflict`: 校验后提交前被并发抢占,已预留行全部释放
    #[instrument(skip(self, selection), fields(
        request_id = %selection.request_id,
        product_id = %selection.product_id,
        picks = selection.picks.len()
    ))]
    pub fn execute(&self, selection: &ManualSelection) -> AllocationResult<AllocationPlan> {
        let mut plan = self.validate_and_plan(selection)?;

        commit_plan(
            self.pool.as_ref(),
            self.history.as_ref(),
            &mut plan,
            &selection.operator,
            None,
        )?;

        info!(
            transaction_id = plan.transaction_id.as_deref().unwrap_or(""),
            quantity = plan.quantity_allocated,
            "人工分配提交成功"
        );
        Ok(plan)
    }

    /// 逐行校验并构建方案(不触碰库存)
    fn validate_and_plan(&self, selection: &ManualSelection) -> AllocationResult<AllocationPlan> {
        if selection.request_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "request_id 不能为空".to_string(),
            ));
        }
        if selection.product_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "product_id 不能为空".to_string(),
            ));
        }
        if selection.location_code.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "人工选择必须指定库位".to_string(),
            ));
        }
        if selection.operator.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "操作员不能为空".to_string(),
            ));
        }
        if selection.quantity_needed <= 0 {
            return Err(AllocationError::InvalidRequest(format!(
                "需求数量必须为正数: {}",
                selection.quantity_needed
            )));
        }
        if selection.picks.is_empty() {
            return Err(AllocationError::InvalidRequest(
                "人工选择明细不能为空".to_string(),
            ));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for pick in &selection.picks {
            if !seen.insert(pick.unit_id.as_str()) {
                return Err(AllocationError::InvalidRequest(t_with_args(
                    "manual.duplicate_pick",
                    &[("unit_id", pick.unit_id.as_str())],
                )));
            }
        }

        let mut lines: Vec<PlanLine> = Vec::with_capacity(selection.picks.len());
        let mut selected_total: i64 = 0;

        for (idx, pick) in selection.picks.iter().enumerate() {
            if pick.quantity <= 0 {
                return Err(AllocationError::InvalidRequest(format!(
                    "单元 {} 选择数量必须为正数: {}",
                    pick.unit_id, pick.quantity
                )));
            }

            let unit = self
                .pool
                .get_unit(&pick.unit_id)?
                .ok_or_else(|| {
                    AllocationError::InvalidRequest(t_with_args(
                        "manual.unit_not_found",
                        &[("unit_id", pick.unit_id.as_str())],
                    ))
                })?;

            if unit.product_id != selection.product_id {
                return Err(AllocationError::InvalidRequest(t_with_args(
                    "manual.wrong_product",
                    &[
                        ("unit_id", pick.unit_id.as_str()),
                        ("product_id", selection.product_id.as_str()),
                    ],
                )));
            }

            if unit.location_code != selection.location_code {
                return Err(AllocationError::InvalidRequest(t_with_args(
                    "manual.wrong_location",
                    &[
                        ("unit_id", pick.unit_id.as_str()),
                        ("location_code", selection.location_code.as_str()),
                    ],
                )));
            }

            if unit.status != UnitStatus::Available {
                return Err(AllocationError::InvalidRequest(t_with_args(
                    "manual.unit_not_available",
                    &[
                        ("unit_id", pick.unit_id.as_str()),
                        ("status", unit.status.to_db_str()),
                    ],
                )));
            }

            if pick.quantity > unit.quantity_available {
                return Err(AllocationError::InvalidRequest(t_with_args(
                    "manual.pick_exceeds_available",
                    &[
                        ("unit_id", pick.unit_id.as_str()),
                        ("picked", &pick.quantity.to_string()),
                        ("available", &unit.quantity_available.to_string()),
                    ],
                )));
            }

            selected_total += pick.quantity;
            lines.push(PlanLine {
                seq: (idx + 1) as i32,
                unit_id: pick.unit_id.clone(),
                quantity_allocated: pick.quantity,
                unit_cost: unit.unit_cost,
                score: None,
                reason: pick
                    .reason
                    .clone()
                    .unwrap_or_else(|| t("allocation.reason.manual")),
            });
        }

        // 精确匹配: 多选少选都不放行
        if selected_total != selection.quantity_needed {
            return Err(AllocationError::SelectionIncomplete {
                selected: selected_total,
                required: selection.quantity_needed,
            });
        }

        let total_cost: f64 = lines.iter().map(|l| l.line_cost()).sum();
        let average_unit_cost = if selected_total > 0 {
            total_cost / selected_total as f64
        } else {
            0.0
        };

        Ok(AllocationPlan {
            request_id: selection.request_id.clone(),
            product_id: selection.product_id.clone(),
            location_code: Some(selection.location_code.clone()),
            business_context: selection.business_context,
            quantity_requested: selection.quantity_needed,
            quantity_allocated: selected_total,
            total_cost,
            average_unit_cost,
            lines,
            strategy_id: None,
            strategy_name: None,
            strategy_source: StrategySource::Manual,
            recommendations: Vec::new(),
            transaction_id: None,
            planned_at: Utc::now(),
        })
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::ManualPick;
    use crate::domain::types::BusinessContext;
    use crate::domain::unit::InventoryUnit;
    use crate::engine::pool::MemoryInventoryPool;
    use chrono::NaiveDate;

    fn make_unit(unit_id: &str, unit_cost: f64, quantity_available: i64) -> InventoryUnit {
        InventoryUnit {
            unit_id: unit_id.to_string(),
            product_id: "P-001".to_string(),
            location_code: "WH-01".to_string(),
            batch_no: None,
            quantity_received: quantity_available,
            quantity_available,
            unit_cost,
            acquisition_date: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
            warranty_expiry_date: None,
            performance_rating: None,
            failure_count: 0,
            status: UnitStatus::Available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    fn make_selection(picks: Vec<ManualPick>, quantity_needed: i64) -> ManualSelection {
        ManualSelection {
            request_id: "REQ-M-001".to_string(),
            product_id: "P-001".to_string(),
            location_code: "WH-01".to_string(),
            quantity_needed,
            business_context: BusinessContext::Manufacturing,
            picks,
            operator: "op-zhang".to_string(),
        }
    }

    fn pick(unit_id: &str, quantity: i64) -> ManualPick {
        ManualPick {
            unit_id: unit_id.to_string(),
            quantity,
            reason: None,
        }
    }

    #[test]
    fn test_manual_execute_commits_selection() {
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![
            make_unit("U-A", 100.0, 5),
            make_unit("U-B", 80.0, 3),
        ]));
        let manual = ManualAllocator::new(pool.clone(), pool.clone());

        let mut picks = vec![pick("U-A", 2), pick("U-B", 3)];
        picks[0].reason = Some("指定整柜发运".to_string());
        let plan = manual.execute(&make_selection(picks, 5)).unwrap();

        assert!(plan.transaction_id.is_some());
        assert_eq!(plan.strategy_source, StrategySource::Manual);
        assert_eq!(plan.strategy_id, None);
        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].score, None);
        assert_eq!(plan.lines[0].reason, "指定整柜发运");
        assert!(!plan.lines[1].reason.is_empty());
        assert!((plan.total_cost - 440.0).abs() < 1e-9);

        // U-A 部分消耗保持 AVAILABLE,U-B 抽干定格 ALLOCATED
        let a = pool.get_unit("U-A").unwrap().unwrap();
        let b = pool.get_unit("U-B").unwrap().unwrap();
        assert_eq!(a.quantity_available, 3);
        assert_eq!(a.status, UnitStatus::Available);
        assert_eq!(b.quantity_available, 0);
        assert_eq!(b.status, UnitStatus::Allocated);

        let recorded = pool.recorded_transactions().unwrap();
        assert_eq!(recorded.len(), 1);
        let (txn, lines) = &recorded[0];
        assert_eq!(txn.strategy_source, StrategySource::Manual);
        assert_eq!(txn.strategy_id, None);
        assert_eq!(txn.location_code, "WH-01");
        assert_eq!(txn.config_snapshot_json, None);
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_manual_rejects_unknown_unit() {
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![make_unit(
            "U-A", 100.0, 5,
        )]));
        let manual = ManualAllocator::new(pool.clone(), pool);

        let err = manual
            .execute(&make_selection(vec![pick("U-MISSING", 1)], 1))
            .unwrap_err();
        match err {
            AllocationError::InvalidRequest(msg) => assert!(msg.contains("U-MISSING")),
            other => panic!("期望 InvalidRequest, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_manual_rejects_wrong_product_and_location() {
        let mut other_product = make_unit("U-P2", 50.0, 5);
        other_product.product_id = "P-002".to_string();
        let mut other_location = make_unit("U-L2", 50.0, 5);
        other_location.location_code = "WH-99".to_string();

        let pool = Arc::new(MemoryInventoryPool::with_units(vec![
            other_product,
            other_location,
        ]));
        let manual = ManualAllocator::new(pool.clone(), pool);

        let err = manual
            .execute(&make_selection(vec![pick("U-P2", 1)], 1))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));

        let err = manual
            .execute(&make_selection(vec![pick("U-L2", 1)], 1))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn test_manual_rejects_unavailable_unit() {
        let mut frozen = make_unit("U-X", 60.0, 4);
        frozen.status = UnitStatus::Unavailable;
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![frozen]));
        let manual = ManualAllocator::new(pool.clone(), pool);

        let err = manual
            .execute(&make_selection(vec![pick("U-X", 1)], 1))
            .unwrap_err();
        match err {
            AllocationError::InvalidRequest(msg) => assert!(msg.contains("U-X")),
            other => panic!("期望 InvalidRequest, 实际 {:?}", other),
        }
    }

    #[test]
    fn test_manual_rejects_duplicate_picks() {
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![make_unit(
            "U-A", 100.0, 5,
        )]));
        let manual = ManualAllocator::new(pool.clone(), pool);

        let err = manual
            .execute(&make_selection(vec![pick("U-A", 1), pick("U-A", 2)], 3))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    #[test]
    fn test_manual_rejects_overdraw() {
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![make_unit(
            "U-A", 100.0, 2,
        )]));
        let manual = ManualAllocator::new(pool.clone(), pool.clone());

        let err = manual
            .execute(&make_selection(vec![pick("U-A", 3)], 3))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));

        // 校验失败不触碰库存
        assert_eq!(pool.get_unit("U-A").unwrap().unwrap().quantity_available, 2);
        assert!(pool.recorded_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_manual_requires_exact_quantity_match() {
        let pool = Arc::new(MemoryInventoryPool::with_units(vec![
            make_unit("U-A", 100.0, 5),
            make_unit("U-B", 80.0, 3),
        ]));
        let manual = ManualAllocator::new(pool.clone(), pool.clone());

        // 少选
        let err = manual
            .execute(&make_selection(vec![pick("U-A", 2)], 5))
            .unwrap_err();
        match err {
            AllocationError::SelectionIncomplete { selected, required } => {
                assert_eq!(selected, 2);
                assert_eq!(required, 5);
            }
            other => panic!("期望 SelectionIncomplete, 实际 {:?}", other),
        }

        // 多选同样拒绝
        let err = manual
            .execute(&make_selection(vec![pick("U-A", 4), pick("U-B", 3)], 5))
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SelectionIncomplete {
                selected: 7,
                required: 5
            }
        ));

        // 两次失败都不触碰库存
        assert_eq!(pool.get_unit("U-A").unwrap().unwrap().quantity_available, 5);
        assert!(pool.recorded_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_manual_rejects_empty_picks_and_nonpositive_quantity() {
        let pool = Arc::new(MemoryInventoryPool::new());
        let manual = ManualAllocator::new(pool.clone(), pool);

        let err = manual.execute(&make_selection(vec![], 3)).unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));

        let err = manual
            .execute(&make_selection(vec![pick("U-A", 0)], 0))
            .unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }
}
