// ==========================================
// 库存分配引擎 - 核心库
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 分配域总纲
// 技术栈: Rust + SQLite
// 系统定位: 决策支持引擎 (预览/执行两阶段, 人工可干预)
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分配业务规则
pub mod engine;

// 导入层 - 入库数据接入
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BusinessContext, CriteriaKind, CustomerTier, PerformanceRating, PreferenceScopeKind,
    ProjectPriority, SortDirection, StrategyKind, StrategySource, UnitStatus,
};

// 领域实体
pub use domain::{
    AllocationPlan, AllocationPreference, AllocationRequest, AllocationRule, AllocationStrategy,
    AllocationTransaction, InventoryUnit, ManualPick, ManualSelection, PlanLine, TransactionLine,
};

// 引擎
pub use engine::{
    AllocationError, AllocationResult, Allocator, AllocatorKnobs, InventoryPool, ManualAllocator,
    MemoryInventoryPool, StrategyResolver, UnitScorer,
};

// 导入层
pub use importer::{ImportError, ImportResult, UnitImporter, UnitImporterImpl};

// API
pub use api::AllocationApi;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "库存分配引擎";

// 数据库版本
pub const DB_VERSION: &str = "v0.1";

// ==========================================
// 预编译检查
// ==========================================

// 确保编译时所有模块可见
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
