// ==========================================
// 库存分配引擎 - 分配编排器
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.3 预览 / 4.4 执行提交
// 红线: 预览零副作用;执行全有或全无,部分提交禁止
// ==========================================
// 职责: 解析策略 → 取候选 → 评分 → 贪心填充 → (执行时)预留提交
// 输入: AllocationRequest
// 输出: AllocationPlan (预览无 transaction_id,提交有)
// ==========================================

use crate::domain::allocation::{
    AllocationPlan, AllocationRequest, AllocationTransaction, PlanLine, TransactionLine,
};
use crate::domain::strategy::AllocationStrategy;
use crate::domain::unit::InventoryUnit;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::pool::{AllocationHistory, InventoryPool};
use crate::engine::resolver::{ResolvedStrategy, StrategyDirectory, StrategyResolver};
use crate::engine::scorer::UnitScorer;
use crate::i18n::{t, t_with_args};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// AllocatorKnobs - 建议项阈值配置
// ==========================================
// 只影响 recommendations 文案,不影响选择结果;
// 提交时整体序列化为事务的配置快照
#[derive(Debug, Clone, Serialize)]
pub struct AllocatorKnobs {
    /// 质保剩余天数低于该值时提示 (天)
    pub warranty_warning_days: i64,
    /// 方案平均成本高出产品可用均值该百分比时提示 (%)
    pub cost_over_avg_warn_pct: f64,
    /// 历史故障次数达到该值时提示 (次)
    pub failure_count_warn: i64,
}

impl Default for AllocatorKnobs {
    fn default() -> Self {
        Self {
            warranty_warning_days: 90,
            cost_over_avg_warn_pct: 15.0,
            failure_count_warn: 3,
        }
    }
}

// ==========================================
// Allocator - 分配编排器
// ==========================================

pub struct Allocator {
    pool: Arc<dyn InventoryPool>,
    history: Arc<dyn AllocationHistory>,
    resolver: StrategyResolver,
    scorer: UnitScorer,
    knobs: AllocatorKnobs,
}

impl Allocator {
    pub fn new(
        pool: Arc<dyn InventoryPool>,
        history: Arc<dyn AllocationHistory>,
        directory: Arc<dyn StrategyDirectory>,
    ) -> Self {
        Self::with_knobs(pool, history, directory, AllocatorKnobs::default())
    }

    pub fn with_knobs(
        pool: Arc<dyn InventoryPool>,
        history: Arc<dyn AllocationHistory>,
        directory: Arc<dyn StrategyDirectory>,
        knobs: AllocatorKnobs,
    ) -> Self {
        Self {
            pool,
            history,
            resolver: StrategyResolver::new(directory),
            scorer: UnitScorer::new(),
            knobs,
        }
    }

    // ==========================================
    // 预览 (只读)
    // ==========================================

    /// 生成分配方案预览,不触碰库存状态
    ///
    /// 同一请求在池未变化时重复预览,单元顺序与得分完全一致
    pub fn preview(&self, request: &AllocationRequest) -> AllocationResult<AllocationPlan> {
        self.preview_as_of(request, Utc::now().date_naive())
    }

    /// 指定基准日的预览(库龄/质保天数以 today 计算)
    #[instrument(skip(self, request), fields(
        request_id = %request.request_id,
        product_id = %request.product_id,
        quantity = request.quantity_needed
    ))]
    pub fn preview_as_of(
        &self,
        request: &AllocationRequest,
        today: NaiveDate,
    ) -> AllocationResult<AllocationPlan> {
        let (plan, _) = self.build_plan(request, today)?;
        debug!(
            lines = plan.lines.len(),
            total_cost = plan.total_cost,
            strategy = ?plan.strategy_id,
            "预览方案生成"
        );
        Ok(plan)
    }

    // ==========================================
    // 执行 (提交)
    // ==========================================

    /// 执行分配: 重新解析并重算方案后按行预留,全部成功才落库
    ///
    /// # 失败语义
    /// - `AllocationConflict`: 任一行预留失败,已预留行全部释放;重新预览后可重试
    /// - `InsufficientInventory` / `NoStrategyAvailable`: 不可原样重试
    pub fn execute(
        &self,
        request: &AllocationRequest,
        operator: &str,
    ) -> AllocationResult<AllocationPlan> {
        self.execute_as_of(request, operator, Utc::now().date_naive())
    }

    /// 指定基准日的执行
    #[instrument(skip(self, request), fields(
        request_id = %request.request_id,
        product_id = %request.product_id,
        quantity = request.quantity_needed
    ))]
    pub fn execute_as_of(
        &self,
        request: &AllocationRequest,
        operator: &str,
        today: NaiveDate,
    ) -> AllocationResult<AllocationPlan> {
        // 提交前重算方案: 池可能已变化,不盲放预览结果
        let (mut plan, _) = self.build_plan(request, today)?;

        let snapshot = serde_json::to_string(&self.knobs).ok();
        commit_plan(
            self.pool.as_ref(),
            self.history.as_ref(),
            &mut plan,
            operator,
            snapshot,
        )?;

        info!(
            transaction_id = plan.transaction_id.as_deref().unwrap_or(""),
            quantity = plan.quantity_allocated,
            total_cost = plan.total_cost,
            "分配提交成功"
        );
        Ok(plan)
    }

    // ==========================================
    // 方案构建
    // ==========================================

    /// 解析 + 评分 + 贪心填充,预览与执行共用
    fn build_plan(
        &self,
        request: &AllocationRequest,
        today: NaiveDate,
    ) -> AllocationResult<(AllocationPlan, ResolvedStrategy)> {
        request
            .validate()
            .map_err(AllocationError::InvalidRequest)?;

        let candidates = self
            .pool
            .list_available(&request.product_id, request.location_code.as_deref())?;

        // 数量加权均价: 高价值判定与成本建议共用同一口径
        let pool_avg_cost = quantity_weighted_mean_cost(&candidates);

        let resolved = self.resolver.resolve(request, pool_avg_cost)?;

        // 总量闸口: 不足即整单失败,绝不静默给部分方案
        let available: i64 = candidates.iter().map(|u| u.quantity_available).sum();
        if available < request.quantity_needed {
            return Err(AllocationError::InsufficientInventory {
                requested: request.quantity_needed,
                available,
                shortfall: request.quantity_needed - available,
            });
        }

        let scored = self
            .scorer
            .score_candidates(&resolved.strategy, &candidates, today);
        let reason = reason_label(&resolved.strategy);

        // 贪心填充: 从榜首起逐个取 min(余量, 剩余需求)
        let mut lines: Vec<PlanLine> = Vec::new();
        let mut remaining = request.quantity_needed;
        let mut seq = 1;
        for entry in &scored {
            if remaining == 0 {
                break;
            }
            let take = entry.unit.quantity_available.min(remaining);
            lines.push(PlanLine {
                seq,
                unit_id: entry.unit.unit_id.clone(),
                quantity_allocated: take,
                unit_cost: entry.unit.unit_cost,
                score: Some(entry.score),
                reason: reason.clone(),
            });
            remaining -= take;
            seq += 1;
        }

        let quantity_allocated = request.quantity_needed - remaining;
        let total_cost: f64 = lines.iter().map(|l| l.line_cost()).sum();
        let average_unit_cost = if quantity_allocated > 0 {
            total_cost / quantity_allocated as f64
        } else {
            0.0
        };

        // 建议只基于被选中的单元(入榜前缀)
        let chosen: Vec<&InventoryUnit> = scored.iter().take(lines.len()).map(|s| &s.unit).collect();
        let recommendations =
            self.build_recommendations(&chosen, today, average_unit_cost, pool_avg_cost);

        let plan = AllocationPlan {
            request_id: request.request_id.clone(),
            product_id: request.product_id.clone(),
            location_code: request.location_code.clone(),
            business_context: request.business_context,
            quantity_requested: request.quantity_needed,
            quantity_allocated,
            total_cost,
            average_unit_cost,
            lines,
            strategy_id: Some(resolved.strategy.strategy_id.clone()),
            strategy_name: Some(resolved.strategy.strategy_name.clone()),
            strategy_source: resolved.source,
            recommendations,
            transaction_id: None,
            planned_at: Utc::now(),
        };

        Ok((plan, resolved))
    }

    /// 生成建议文案(仅提示,不改变选择结果)
    fn build_recommendations(
        &self,
        chosen: &[&InventoryUnit],
        today: NaiveDate,
        plan_avg_cost: f64,
        pool_avg_cost: f64,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        for unit in chosen {
            // 无质保单元不按"即将过保"提示,质保准则里按 0 天参与评分
            if unit.warranty_expiry_date.is_some() {
                let days = unit.warranty_remaining_days(today);
                if days < self.knobs.warranty_warning_days {
                    recommendations.push(t_with_args(
                        "allocation.recommend.warranty_expiring",
                        &[
                            ("unit_id", unit.unit_id.as_str()),
                            ("days", &days.to_string()),
                            ("threshold", &self.knobs.warranty_warning_days.to_string()),
                        ],
                    ));
                }
            }

            if unit.failure_count >= self.knobs.failure_count_warn {
                recommendations.push(t_with_args(
                    "allocation.recommend.failure_count_high",
                    &[
                        ("unit_id", unit.unit_id.as_str()),
                        ("count", &unit.failure_count.to_string()),
                        ("threshold", &self.knobs.failure_count_warn.to_string()),
                    ],
                ));
            }
        }

        if pool_avg_cost > 0.0 {
            let over_pct = (plan_avg_cost - pool_avg_cost) / pool_avg_cost * 100.0;
            if over_pct > self.knobs.cost_over_avg_warn_pct {
                recommendations.push(t_with_args(
                    "allocation.recommend.cost_above_avg",
                    &[
                        ("plan_avg", &format!("{:.2}", plan_avg_cost)),
                        ("pool_avg", &format!("{:.2}", pool_avg_cost)),
                        ("pct", &format!("{:.1}", over_pct)),
                        ("threshold", &self.knobs.cost_over_avg_warn_pct.to_string()),
                    ],
                ));
            }
        }

        recommendations
    }
}

// ==========================================
// 提交协议 (策略路径与人工路径共用)
// ==========================================

/// 按行预留 → 留痕 → 状态定格
///
/// 失败语义:
/// - 任一行预留失败(前置条件丢失或存储错误): 释放已预留行,返回 AllocationConflict
/// - 留痕失败: 释放已预留行,返回 Storage
/// - 定格失败: 数量已扣、事务已落,提交视为生效;
///   抽干单元滞留 RESERVED 仅是状态标签滞后,finalize 幂等可重放收尾
pub(super) fn commit_plan(
    pool: &dyn InventoryPool,
    history: &dyn AllocationHistory,
    plan: &mut AllocationPlan,
    operator: &str,
    config_snapshot_json: Option<String>,
) -> AllocationResult<()> {
    let mut reserved: Vec<(String, i64)> = Vec::with_capacity(plan.lines.len());

    for line in &plan.lines {
        let ok = match pool.try_reserve(&line.unit_id, line.quantity_allocated, operator) {
            Ok(ok) => ok,
            Err(e) => {
                // 预留环节的存储错误按冲突等价处理: 整体失败并释放
                warn!(unit_id = %line.unit_id, error = %e, "预留遇存储错误,按冲突回退");
                release_reserved(pool, &reserved, operator);
                return Err(AllocationError::AllocationConflict {
                    unit_id: line.unit_id.clone(),
                });
            }
        };

        if !ok {
            debug!(unit_id = %line.unit_id, "预留前置条件丢失,整体回退");
            release_reserved(pool, &reserved, operator);
            return Err(AllocationError::AllocationConflict {
                unit_id: line.unit_id.clone(),
            });
        }

        reserved.push((line.unit_id.clone(), line.quantity_allocated));
    }

    let transaction_id = Uuid::new_v4().to_string();
    let committed_at = Utc::now();

    let txn = AllocationTransaction {
        transaction_id: transaction_id.clone(),
        request_id: plan.request_id.clone(),
        product_id: plan.product_id.clone(),
        location_code: plan
            .location_code
            .clone()
            .unwrap_or_else(|| "*".to_string()),
        business_context: plan.business_context,
        strategy_id: plan.strategy_id.clone(),
        strategy_source: plan.strategy_source,
        quantity_requested: plan.quantity_requested,
        quantity_allocated: plan.quantity_allocated,
        total_cost: plan.total_cost,
        operator: operator.to_string(),
        config_snapshot_json,
        committed_at,
    };

    let txn_lines: Vec<TransactionLine> = plan
        .lines
        .iter()
        .map(|line| TransactionLine {
            line_id: Uuid::new_v4().to_string(),
            transaction_id: transaction_id.clone(),
            seq: line.seq,
            unit_id: line.unit_id.clone(),
            quantity_allocated: line.quantity_allocated,
            unit_cost: line.unit_cost,
            score: line.score,
            reason: Some(line.reason.clone()),
        })
        .collect();

    // 留痕是提交点: 失败则全量回退,成功即提交生效
    if let Err(e) = history.record(&txn, &txn_lines) {
        error!(transaction_id = %transaction_id, error = %e, "事务留痕失败,释放全部预留");
        release_reserved(pool, &reserved, operator);
        return Err(AllocationError::Storage(e));
    }

    let reserved_ids: Vec<String> = reserved.iter().map(|(id, _)| id.clone()).collect();
    match pool.finalize_allocated(&reserved_ids, operator) {
        Ok(count) => debug!(transaction_id = %transaction_id, finalized = count, "提交定格完成"),
        Err(e) => error!(
            transaction_id = %transaction_id,
            error = %e,
            "定格失败,抽干单元暂留 RESERVED,可重放 finalize 收尾"
        ),
    }

    plan.transaction_id = Some(transaction_id);
    Ok(())
}

/// 回退辅助: 逐行释放,单行失败不阻断其余行
fn release_reserved(pool: &dyn InventoryPool, reserved: &[(String, i64)], operator: &str) {
    for (unit_id, quantity) in reserved {
        if let Err(e) = pool.release(unit_id, *quantity, operator) {
            error!(unit_id = %unit_id, quantity, error = %e, "释放预留失败,需人工核查");
        }
    }
}

// ==========================================
// 纯函数辅助
// ==========================================

/// 数量加权平均成本(无可用单元时为 0)
pub(crate) fn quantity_weighted_mean_cost(units: &[InventoryUnit]) -> f64 {
    let total_quantity: i64 = units.iter().map(|u| u.quantity_available).sum();
    if total_quantity <= 0 {
        return 0.0;
    }
    let total_cost: f64 = units
        .iter()
        .map(|u| u.quantity_available as f64 * u.unit_cost)
        .sum();
    total_cost / total_quantity as f64
}

/// 入选理由 = 个体权重最高的启用规则对应文案(权重并列取 priority 靠前者)
fn reason_label(strategy: &AllocationStrategy) -> String {
    let rules = strategy.active_rules();
    let mut best: Option<&crate::domain::strategy::AllocationRule> = None;
    for rule in rules.iter().copied() {
        let better = match best {
            Some(current) => rule.weight > current.weight,
            None => true,
        };
        if better {
            best = Some(rule);
        }
    }

    match best {
        Some(rule) => t(&format!(
            "allocation.reason.{}_{}",
            rule.criteria.to_db_str().to_lowercase(),
            rule.direction.to_db_str().to_lowercase()
        )),
        None => String::new(),
    }
}
