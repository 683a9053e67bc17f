// ==========================================
// 库存分配引擎 - 策略注册中心
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 4.1 策略解析级联
// StrategyDirectory 的生产实现: 把策略仓储与偏好仓储拼成解析器所需的只读目录
// ==========================================

use crate::domain::strategy::{AllocationPreference, AllocationStrategy};
use crate::domain::types::BusinessContext;
use crate::engine::resolver::StrategyDirectory;
use crate::repository::error::RepositoryResult;
use crate::repository::preference_repo::PreferenceRepository;
use crate::repository::strategy_repo::StrategyRepository;
use std::sync::Arc;

// ==========================================
// StrategyRegistry - 策略注册中心
// ==========================================

pub struct StrategyRegistry {
    strategies: Arc<StrategyRepository>,
    preferences: Arc<PreferenceRepository>,
}

impl StrategyRegistry {
    pub fn new(strategies: Arc<StrategyRepository>, preferences: Arc<PreferenceRepository>) -> Self {
        Self {
            strategies,
            preferences,
        }
    }
}

impl StrategyDirectory for StrategyRegistry {
    fn find_strategy(&self, strategy_id: &str) -> RepositoryResult<Option<AllocationStrategy>> {
        self.strategies.find_by_id(strategy_id)
    }

    fn find_preference_for_product(
        &self,
        product_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>> {
        self.preferences.find_for_product(product_id)
    }

    fn find_preference_for_category(
        &self,
        category_id: &str,
    ) -> RepositoryResult<Option<AllocationPreference>> {
        self.preferences.find_for_category(category_id)
    }

    fn find_default_for_context(
        &self,
        context: BusinessContext,
    ) -> RepositoryResult<Option<AllocationStrategy>> {
        self.strategies.find_default_for_context(context)
    }
}
