// ==========================================
// 库存分配引擎 - API 层
// ==========================================
// 职责: 提供业务 API 门面,供宿主应用调用
// ==========================================

pub mod allocation_api;

// 重导出核心类型
pub use allocation_api::{AllocationApi, StrategySummary, TransactionDetail, UnitView};
