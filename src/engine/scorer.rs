// ==========================================
// 库存分配引擎 - 单元评分器
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.2 评分器
// 评分口径:
// - 每条启用规则按"当前候选集"做 min-max 归一化到 0-100 子分
// - ASC 准则原始值最低者得 100,DESC 准则原始值最高者得 100
// - 综合分 = Σ(权重×子分) / Σ(权重),与规则条数无关,始终落在 0-100
// - 候选集内全员同值的准则对每个单元贡献中位 50,不做除零
// 注意: 归一化按请求重算,同一单元在不同请求下分数可不同,
//       分数只在本次候选集内可比
// ==========================================

use crate::domain::strategy::AllocationStrategy;
use crate::domain::types::{CriteriaKind, SortDirection};
use crate::domain::unit::InventoryUnit;
use chrono::NaiveDate;
use std::cmp::Ordering;

// ==========================================
// ScoredUnit - 评分结果
// ==========================================

/// 单条准则的评分明细(可解释性)
#[derive(Debug, Clone)]
pub struct CriterionScore {
    pub criteria: CriteriaKind,
    pub direction: SortDirection,
    pub weight: f64,
    pub raw_value: f64,
    pub sub_score: f64,
}

/// 候选单元 + 综合分 + 分准则明细
#[derive(Debug, Clone)]
pub struct ScoredUnit {
    pub unit: InventoryUnit,
    pub score: f64,
    pub sub_scores: Vec<CriterionScore>,
}

impl ScoredUnit {
    /// 指定准则的原始值(平分决胜用)
    fn raw_of(&self, criteria: CriteriaKind) -> Option<f64> {
        self.sub_scores
            .iter()
            .find(|c| c.criteria == criteria)
            .map(|c| c.raw_value)
    }
}

// ==========================================
// UnitScorer - 评分引擎
// ==========================================
pub struct UnitScorer {
    // 无状态引擎,不需要注入依赖
}

impl UnitScorer {
    pub fn new() -> Self {
        Self {}
    }

    /// 对候选单元评分并按分配顺序排序
    ///
    /// 排序键:
    /// 1) 综合分降序
    /// 2) priority 最小的启用规则对应准则的原始值升序
    /// 3) unit_id 升序 (完全确定性)
    ///
    /// # 参数
    /// - `strategy`: 已解析的策略快照
    /// - `units`: 当前候选集 (AVAILABLE 且有余量)
    /// - `today`: 库龄/质保剩余天数的计算基准日
    pub fn score_candidates(
        &self,
        strategy: &AllocationStrategy,
        units: &[InventoryUnit],
        today: NaiveDate,
    ) -> Vec<ScoredUnit> {
        if units.is_empty() {
            return Vec::new();
        }

        let rules = strategy.active_rules();

        let mut scored: Vec<ScoredUnit> = units
            .iter()
            .map(|u| ScoredUnit {
                unit: u.clone(),
                score: 0.0,
                sub_scores: Vec::with_capacity(rules.len()),
            })
            .collect();

        // 逐准则归一化: 极值取自候选集本身
        for rule in &rules {
            let raws: Vec<f64> = units
                .iter()
                .map(|u| Self::raw_value(u, rule.criteria, today))
                .collect();

            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for raw in &raws {
                min = min.min(*raw);
                max = max.max(*raw);
            }

            let span = max - min;
            for (entry, raw) in scored.iter_mut().zip(raws.iter()) {
                let sub_score = if span > 0.0 {
                    match rule.direction {
                        SortDirection::Asc => (max - raw) / span * 100.0,
                        SortDirection::Desc => (raw - min) / span * 100.0,
                    }
                } else {
                    // 全员同值: 中位贡献,不参与区分
                    50.0
                };

                entry.sub_scores.push(CriterionScore {
                    criteria: rule.criteria,
                    direction: rule.direction,
                    weight: rule.weight,
                    raw_value: *raw,
                    sub_score,
                });
            }
        }

        // 加权汇总 (权重和为正由规则校验保证,此处仍做中位兜底)
        let total_weight: f64 = rules.iter().map(|r| r.weight).sum();
        for entry in &mut scored {
            entry.score = if total_weight > 0.0 {
                entry
                    .sub_scores
                    .iter()
                    .map(|c| c.weight * c.sub_score)
                    .sum::<f64>()
                    / total_weight
            } else {
                50.0
            };
        }

        // active_rules 已按 priority 升序,首条即决胜准则
        let tiebreak_criteria = rules.first().map(|r| r.criteria);
        scored.sort_by(|a, b| Self::compare(a, b, tiebreak_criteria));
        scored
    }

    /// 准则原始值提取
    ///
    /// - `UnitCost`: 到岸单位成本 (非有限值按 0 处理)
    /// - `WarrantyRemainingDays`: max(质保到期-基准日, 0),无质保按 0
    /// - `AgeDays`: 基准日-入库日,负值截断为 0
    /// - `PerformanceRating`: 序数映射 100/75/50/25,未评级 0
    /// - `FailureCount`: 历史故障次数
    fn raw_value(unit: &InventoryUnit, criteria: CriteriaKind, today: NaiveDate) -> f64 {
        match criteria {
            CriteriaKind::UnitCost => {
                if unit.unit_cost.is_finite() {
                    unit.unit_cost
                } else {
                    0.0
                }
            }
            CriteriaKind::WarrantyRemainingDays => unit.warranty_remaining_days(today) as f64,
            CriteriaKind::AgeDays => unit.age_days(today) as f64,
            CriteriaKind::PerformanceRating => unit.rating_ordinal(),
            CriteriaKind::FailureCount => unit.failure_count as f64,
        }
    }

    /// 比较两个评分结果的分配顺序
    fn compare(a: &ScoredUnit, b: &ScoredUnit, tiebreak: Option<CriteriaKind>) -> Ordering {
        // 1. 综合分降序
        match b.score.total_cmp(&a.score) {
            Ordering::Equal => {}
            other => return other,
        }

        // 2. 决胜准则原始值升序
        if let Some(criteria) = tiebreak {
            if let (Some(raw_a), Some(raw_b)) = (a.raw_of(criteria), b.raw_of(criteria)) {
                match raw_a.total_cmp(&raw_b) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
        }

        // 3. unit_id 升序兜底
        a.unit.unit_id.cmp(&b.unit.unit_id)
    }
}

impl Default for UnitScorer {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{AllocationRule, AllocationStrategy};
    use crate::domain::types::{PerformanceRating, StrategyKind, UnitStatus};
    use chrono::{Duration, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    /// 创建测试用的库存单元
    fn make_unit(
        unit_id: &str,
        unit_cost: f64,
        quantity_available: i64,
        age_days: i64,
        warranty_days_left: Option<i64>,
        rating: Option<PerformanceRating>,
        failure_count: i64,
    ) -> InventoryUnit {
        InventoryUnit {
            unit_id: unit_id.to_string(),
            product_id: "P-001".to_string(),
            location_code: "WH-01".to_string(),
            batch_no: None,
            quantity_received: quantity_available,
            quantity_available,
            unit_cost,
            acquisition_date: today() - Duration::days(age_days),
            warranty_expiry_date: warranty_days_left.map(|d| today() + Duration::days(d)),
            performance_rating: rating,
            failure_count,
            status: UnitStatus::Available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    fn make_rule(
        criteria: CriteriaKind,
        weight: f64,
        direction: SortDirection,
        priority: i32,
    ) -> AllocationRule {
        AllocationRule {
            rule_id: format!("R-{}", priority),
            strategy_id: "S-TEST".to_string(),
            criteria,
            weight,
            direction,
            priority,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_strategy(rules: Vec<AllocationRule>) -> AllocationStrategy {
        AllocationStrategy {
            strategy_id: "S-TEST".to_string(),
            strategy_name: "测试策略".to_string(),
            kind: StrategyKind::Custom,
            description: None,
            is_active: true,
            is_default: false,
            default_context: None,
            rules,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_cost_asc_cheapest_scores_100() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::UnitCost,
            1.0,
            SortDirection::Asc,
            1,
        )]);
        let units = vec![
            make_unit("U-A", 100.0, 5, 10, None, None, 0),
            make_unit("U-B", 80.0, 3, 10, None, None, 0),
            make_unit("U-C", 90.0, 2, 10, None, None, 0),
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // 最便宜的 B 得 100 排第一,最贵的 A 得 0 排最后
        assert_eq!(scored[0].unit.unit_id, "U-B");
        assert!((scored[0].score - 100.0).abs() < 1e-9);
        assert_eq!(scored[1].unit.unit_id, "U-C");
        assert!((scored[1].score - 50.0).abs() < 1e-9);
        assert_eq!(scored[2].unit.unit_id, "U-A");
        assert!(scored[2].score.abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_criterion_contributes_midpoint() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::UnitCost,
            2.5,
            SortDirection::Asc,
            1,
        )]);
        let units = vec![
            make_unit("U-A", 75.0, 1, 10, None, None, 0),
            make_unit("U-B", 75.0, 1, 20, None, None, 0),
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // 全员同成本: 不除零,统一 50
        assert!((scored[0].score - 50.0).abs() < 1e-9);
        assert!((scored[1].score - 50.0).abs() < 1e-9);
        // 平分按 unit_id 升序
        assert_eq!(scored[0].unit.unit_id, "U-A");
    }

    #[test]
    fn test_composite_is_weight_normalized() {
        let scorer = UnitScorer::new();
        // 成本权重 3.0, 质保权重 1.0 → 综合分 = (3·cost + 1·warranty) / 4
        let strategy = make_strategy(vec![
            make_rule(CriteriaKind::UnitCost, 3.0, SortDirection::Asc, 1),
            make_rule(CriteriaKind::WarrantyRemainingDays, 1.0, SortDirection::Desc, 2),
        ]);
        let units = vec![
            make_unit("U-A", 80.0, 1, 10, Some(100), None, 0),
            make_unit("U-B", 100.0, 1, 10, Some(400), None, 0),
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // A: cost 子分 100, warranty 子分 0 → (300+0)/4 = 75
        // B: cost 子分 0, warranty 子分 100 → (0+100)/4 = 25
        let a = scored.iter().find(|s| s.unit.unit_id == "U-A").unwrap();
        let b = scored.iter().find(|s| s.unit.unit_id == "U-B").unwrap();
        assert!((a.score - 75.0).abs() < 1e-9);
        assert!((b.score - 25.0).abs() < 1e-9);
        assert_eq!(scored[0].unit.unit_id, "U-A");
    }

    #[test]
    fn test_rating_ordinal_mapping() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::PerformanceRating,
            1.0,
            SortDirection::Desc,
            1,
        )]);
        let units = vec![
            make_unit("U-EX", 50.0, 1, 10, None, Some(PerformanceRating::Excellent), 0),
            make_unit("U-AVG", 50.0, 1, 10, None, Some(PerformanceRating::Average), 0),
            make_unit("U-NONE", 50.0, 1, 10, None, None, 0),
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // 序数 100 / 50 / 0 → 归一化后 100 / 50 / 0
        assert_eq!(scored[0].unit.unit_id, "U-EX");
        assert!((scored[0].score - 100.0).abs() < 1e-9);
        assert_eq!(scored[1].unit.unit_id, "U-AVG");
        assert!((scored[1].score - 50.0).abs() < 1e-9);
        assert_eq!(scored[2].unit.unit_id, "U-NONE");
        assert!(scored[2].score.abs() < 1e-9);
    }

    #[test]
    fn test_missing_warranty_counts_as_zero_days() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::WarrantyRemainingDays,
            1.0,
            SortDirection::Desc,
            1,
        )]);
        let units = vec![
            make_unit("U-A", 50.0, 1, 10, Some(365), None, 0),
            make_unit("U-B", 50.0, 1, 10, None, None, 0),
            make_unit("U-C", 50.0, 1, 10, Some(-30), None, 0), // 已过保
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // 无质保与已过保同按 0 天: 两者子分相同,按 unit_id 决胜
        assert_eq!(scored[0].unit.unit_id, "U-A");
        assert_eq!(scored[1].unit.unit_id, "U-B");
        assert_eq!(scored[2].unit.unit_id, "U-C");
        assert!((scored[1].score - scored[2].score).abs() < 1e-9);
    }

    #[test]
    fn test_normalization_is_per_candidate_set() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::UnitCost,
            1.0,
            SortDirection::Asc,
            1,
        )]);

        let two = vec![
            make_unit("U-A", 100.0, 1, 10, None, None, 0),
            make_unit("U-B", 80.0, 1, 10, None, None, 0),
        ];
        let three = vec![
            make_unit("U-A", 100.0, 1, 10, None, None, 0),
            make_unit("U-B", 80.0, 1, 10, None, None, 0),
            make_unit("U-C", 200.0, 1, 10, None, None, 0),
        ];

        let scored_two = scorer.score_candidates(&strategy, &two, today());
        let scored_three = scorer.score_candidates(&strategy, &three, today());

        // 候选集变化后极值变化,同一单元分数随之变化 (有意设计)
        let a_in_two = scored_two.iter().find(|s| s.unit.unit_id == "U-A").unwrap();
        let a_in_three = scored_three.iter().find(|s| s.unit.unit_id == "U-A").unwrap();
        assert!(a_in_two.score.abs() < 1e-9); // 两候选中最贵 → 0
        // 三候选中极值变为 [80, 200]: (200-100)/120×100 ≈ 83.33
        assert!((a_in_three.score - 250.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_tiebreak_uses_first_priority_rule_raw_then_unit_id() {
        let scorer = UnitScorer::new();
        // A 成本占优,B 质保占优,等权 → 综合分同为 50
        let strategy = make_strategy(vec![
            make_rule(CriteriaKind::UnitCost, 1.0, SortDirection::Asc, 1),
            make_rule(CriteriaKind::WarrantyRemainingDays, 1.0, SortDirection::Desc, 2),
        ]);
        let units = vec![
            make_unit("U-Z", 80.0, 1, 10, Some(100), None, 0),
            make_unit("U-A", 100.0, 1, 10, Some(400), None, 0),
        ];

        let scored = scorer.score_candidates(&strategy, &units, today());

        // 决胜规则为 priority=1 的成本准则,原始值升序: 80 在前
        // 即便 U-Z 的 unit_id 排序靠后
        assert!((scored[0].score - scored[1].score).abs() < 1e-9);
        assert_eq!(scored[0].unit.unit_id, "U-Z");
        assert_eq!(scored[1].unit.unit_id, "U-A");
    }

    #[test]
    fn test_empty_candidates_yield_empty_result() {
        let scorer = UnitScorer::new();
        let strategy = make_strategy(vec![make_rule(
            CriteriaKind::UnitCost,
            1.0,
            SortDirection::Asc,
            1,
        )]);
        assert!(scorer.score_candidates(&strategy, &[], today()).is_empty());
    }
}
