// ==========================================
// 库存分配引擎 - 引擎层
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 2. 组件表 / 4. 分配流程
// ==========================================
// 职责: 策略解析、候选评分、方案编排与提交协议
// 红线: Engine 不拼 SQL;预览零副作用;所有方案行必须输出 reason
// ==========================================

pub mod allocator;
pub mod error;
pub mod manual;
pub mod pool;
pub mod resolver;
pub mod scorer;

// 重导出核心引擎
pub use allocator::{Allocator, AllocatorKnobs};
pub use error::{AllocationError, AllocationResult};
pub use manual::ManualAllocator;
pub use pool::{AllocationHistory, InventoryPool, MemoryInventoryPool};
pub use resolver::{ResolvedStrategy, StrategyDirectory, StrategyResolver};
pub use scorer::{CriterionScore, ScoredUnit, UnitScorer};
