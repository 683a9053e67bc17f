// ==========================================
// 库存分配引擎 - 分配错误分类
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 7. 错误处理设计
// 四类业务错误均为类型化结果,调用方按类分流,不得退化为字符串
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

// ==========================================
// AllocationError - 分配错误类型
// ==========================================

#[derive(Error, Debug)]
pub enum AllocationError {
    /// 配置缺口: 级联解析走完仍无可用策略,需管理员补配置,调用方不可重试
    #[error("无可用分配策略: 产品={product_id}, 业务场景={business_context}")]
    NoStrategyAvailable {
        product_id: String,
        business_context: String,
    },

    /// 业务性缺货: 可用总量不足,调用方调减数量或补货后再发起
    #[error("库存不足: 需求={requested}, 可用={available}, 缺口={shortfall}")]
    InsufficientInventory {
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// 并发竞争: 预占前置条件已被其他提交破坏,预期通过重新预览后重试
    #[error("分配冲突: 单元 {unit_id} 已被并发提交占用,请重新预览后重试")]
    AllocationConflict { unit_id: String },

    /// 人工选择数量与需求不符,提交前必须补齐
    #[error("人工选择不完整: 已选={selected}, 需求={required}")]
    SelectionIncomplete { selected: i64, required: i64 },

    /// 请求本身不合法(数量非正、单元与产品不匹配等)
    #[error("请求无效: {0}")]
    InvalidRequest(String),

    /// 底层存储错误(预占环节的存储错误按冲突等价处理,见 Allocator)
    #[error("存储层错误: {0}")]
    Storage(#[from] RepositoryError),
}

impl AllocationError {
    /// 错误码(对外接口与日志用,稳定标识)
    pub fn code(&self) -> &'static str {
        match self {
            AllocationError::NoStrategyAvailable { .. } => "NO_STRATEGY_AVAILABLE",
            AllocationError::InsufficientInventory { .. } => "INSUFFICIENT_INVENTORY",
            AllocationError::AllocationConflict { .. } => "ALLOCATION_CONFLICT",
            AllocationError::SelectionIncomplete { .. } => "SELECTION_INCOMPLETE",
            AllocationError::InvalidRequest(_) => "INVALID_REQUEST",
            AllocationError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// 是否建议调用方重试(仅并发冲突类,重试前应重新预览)
    pub fn is_retryable(&self) -> bool {
        matches!(self, AllocationError::AllocationConflict { .. })
    }
}

pub type AllocationResult<T> = Result<T, AllocationError>;
