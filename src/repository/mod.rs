// ==========================================
// 库存分配引擎 - 数据仓储层
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3. 数据模型 / 5. 并发契约
// 红线: Repository 不含分配决策逻辑;预占/释放只做条件更新
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod preference_repo;
pub mod registry;
pub mod strategy_repo;
pub mod transaction_repo;
pub mod unit_repo;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use preference_repo::PreferenceRepository;
pub use registry::StrategyRegistry;
pub use strategy_repo::StrategyRepository;
pub use transaction_repo::TransactionRepository;
pub use unit_repo::UnitRepository;
