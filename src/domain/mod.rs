// ==========================================
// 库存分配引擎 - 领域模型层
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3. 数据模型
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod allocation;
pub mod strategy;
pub mod types;
pub mod unit;

// 重导出核心类型
pub use allocation::{
    AllocationPlan, AllocationRequest, AllocationTransaction, ManualPick, ManualSelection,
    PlanLine, TransactionLine,
};
pub use strategy::{
    AllocationPreference, AllocationRule, AllocationStrategy, MAX_RULE_WEIGHT, MIN_RULE_WEIGHT,
};
pub use types::{
    BusinessContext, CriteriaKind, CustomerTier, PerformanceRating, PreferenceScopeKind,
    ProjectPriority, SortDirection, StrategyKind, StrategySource, UnitStatus,
};
pub use unit::{
    DqLevel, DqSummary, DqViolation, ImportOutcome, InventoryUnit, RawUnitRecord,
};
