// ==========================================
// 库存分配引擎 - 策略解析器
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.1 策略解析级联
// 级联顺序(先到先得):
//   1) 请求指定策略  2) 产品级偏好  3) 类目级偏好  4) 场景全局默认
// 候选策略必须"可解析"(启用且至少一条启用规则),否则跳过
// ==========================================

use crate::domain::allocation::AllocationRequest;
use crate::domain::strategy::{AllocationPreference, AllocationStrategy};
use crate::domain::types::{BusinessContext, CustomerTier, ProjectPriority, StrategySource};
use crate::engine::error::{AllocationError, AllocationResult};
use crate::repository::error::RepositoryResult;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// StrategyDirectory - 策略目录读取口
// ==========================================
/// 策略目录读取接口
/// 生产实现为 `repository::registry::StrategyRegistry`,测试可用内存假实现
pub trait StrategyDirectory: Send + Sync {
    /// 按 ID 查策略(含规则)
    fn find_strategy(&self, strategy_id: &str) -> RepositoryResult<Option<AllocationStrategy>>;

    /// 查产品级偏好(仅启用的)
    fn find_preference_for_product(
        &self,
        product_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>>;

    /// 查类目级偏好(仅启用的)
    fn find_preference_for_category(
        &self,
        category_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>>;

    /// 查业务场景的全局默认策略
    fn find_default_for_context(
        &self,
        context: BusinessContext,
    ) -> RepositoryResult<Option<AllocationStrategy>>;
}

// ==========================================
// ResolvedStrategy - 解析结果
// ==========================================
/// 解析结果:策略全量快照 + 命中来源
/// 快照在解析时刻固定,分配过程中不再回读策略表
#[derive(Debug, Clone)]
pub struct ResolvedStrategy {
    pub strategy: AllocationStrategy,
    pub source: StrategySource,
}

// ==========================================
// StrategyResolver - 策略解析器
// ==========================================

pub struct StrategyResolver {
    directory: Arc<dyn StrategyDirectory>,
}

impl StrategyResolver {
    pub fn new(directory: Arc<dyn StrategyDirectory>) -> Self {
        Self { directory }
    }

    /// 解析本次请求应使用的策略
    ///
    /// # 参数
    /// - `request`: 分配请求
    /// - `unit_cost_estimate`: 该产品当前可用单元的数量加权平均成本
    ///   (高价值判定用;无可用单元时传 0.0,高价值规则自然不命中)
    ///
    /// # 返回
    /// 命中的策略快照与来源;级联走完无命中则返回 `NoStrategyAvailable`
    pub fn resolve(
        &self,
        request: &AllocationRequest,
        unit_cost_estimate: f64,
    ) -> AllocationResult<ResolvedStrategy> {
        // 级联第 1 级: 请求指定策略
        if let Some(resolved) = self.try_custom(request)? {
            return Ok(resolved);
        }

        // 级联第 2 级: 产品级偏好
        // 注意: 偏好存在但其引用的策略全部不可解析时,不再落到类目级,直接走全局默认
        let product_pref = self
            .directory
            .find_preference_for_product(&request.product_id)?;
        if let Some(pref) = &product_pref {
            if let Some(strategy) = self.try_preference(pref, request, unit_cost_estimate)? {
                info!(
                    strategy_id = %strategy.strategy_id,
                    source = "PRODUCT_PREFERENCE",
                    "策略解析完成"
                );
                return Ok(ResolvedStrategy {
                    strategy,
                    source: StrategySource::ProductPreference,
                });
            }
        }

        // 级联第 3 级: 类目级偏好(仅当产品级偏好不存在时)
        if product_pref.is_none() {
            if let Some(category_id) = &request.category_id {
                if let Some(pref) = self.directory.find_preference_for_category(category_id)? {
                    if let Some(strategy) =
                        self.try_preference(&pref, request, unit_cost_estimate)?
                    {
                        info!(
                            strategy_id = %strategy.strategy_id,
                            source = "CATEGORY_PREFERENCE",
                            "策略解析完成"
                        );
                        return Ok(ResolvedStrategy {
                            strategy,
                            source: StrategySource::CategoryPreference,
                        });
                    }
                }
            }
        }

        // 级联第 4 级: 业务场景全局默认
        if let Some(strategy) = self
            .directory
            .find_default_for_context(request.business_context)?
            .filter(|s| s.is_resolvable())
        {
            info!(
                strategy_id = %strategy.strategy_id,
                source = "GLOBAL_DEFAULT",
                "策略解析完成"
            );
            return Ok(ResolvedStrategy {
                strategy,
                source: StrategySource::GlobalDefault,
            });
        }

        // 级联穷尽: 配置缺口,不得退化为空规则集
        Err(AllocationError::NoStrategyAvailable {
            product_id: request.product_id.clone(),
            business_context: request.business_context.to_db_str().to_string(),
        })
    }

    /// 第 1 级: 请求指定策略(不可解析则放行到下一级)
    fn try_custom(&self, request: &AllocationRequest) -> AllocationResult<Option<ResolvedStrategy>> {
        let Some(custom_id) = &request.custom_strategy_id else {
            return Ok(None);
        };

        match self.load_resolvable(custom_id)? {
            Some(strategy) => {
                info!(strategy_id = %custom_id, source = "CUSTOM", "策略解析完成");
                Ok(Some(ResolvedStrategy {
                    strategy,
                    source: StrategySource::Custom,
                }))
            }
            None => {
                debug!(strategy_id = %custom_id, "请求指定策略不可解析,进入偏好级联");
                Ok(None)
            }
        }
    }

    /// 偏好内部子规则(先到先得):
    /// 高级客户 → 高价值订单 → 关键项目 → 偏好默认
    /// 子规则命中但策略不可解析时,顺延到下一条子规则
    fn try_preference(
        &self,
        pref: &AllocationPreference,
        request: &AllocationRequest,
        unit_cost_estimate: f64,
    ) -> AllocationResult<Option<AllocationStrategy>> {
        let mut candidates: Vec<(&str, &String)> = Vec::new();

        if request.customer_tier == CustomerTier::Premium {
            if let Some(id) = &pref.premium_customer_strategy_id {
                candidates.push(("高级客户", id));
            }
        }

        if let (Some(threshold), Some(id)) =
            (pref.high_value_threshold, &pref.high_value_strategy_id)
        {
            let order_value = request.quantity_needed as f64 * unit_cost_estimate;
            if order_value > threshold {
                candidates.push(("高价值订单", id));
            }
        }

        if request.project_priority == ProjectPriority::Critical {
            if let Some(id) = &pref.critical_project_strategy_id {
                candidates.push(("关键项目", id));
            }
        }

        if let Some(id) = &pref.default_strategy_id {
            candidates.push(("偏好默认", id));
        }

        for (label, strategy_id) in candidates {
            match self.load_resolvable(strategy_id)? {
                Some(strategy) => {
                    debug!(
                        preference_id = %pref.preference_id,
                        rule = label,
                        strategy_id = %strategy_id,
                        "偏好子规则命中"
                    );
                    return Ok(Some(strategy));
                }
                None => {
                    debug!(
                        preference_id = %pref.preference_id,
                        rule = label,
                        strategy_id = %strategy_id,
                        "偏好子规则命中但策略不可解析,顺延"
                    );
                }
            }
        }

        Ok(None)
    }

    /// 加载并校验可解析性(存在 + 启用 + 至少一条启用规则)
    fn load_resolvable(&self, strategy_id: &str) -> AllocationResult<Option<AllocationStrategy>> {
        let strategy = self.directory.find_strategy(strategy_id)?;
        Ok(strategy.filter(|s| s.is_resolvable()))
    }
}
