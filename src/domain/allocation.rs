// ==========================================
// 库存分配引擎 - 分配请求/方案领域模型
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3.3 请求与方案
// 依据: ERP_Alloc_Core_Spec.md - 4.4 执行提交协议
// ==========================================

use crate::domain::types::{BusinessContext, CustomerTier, ProjectPriority, StrategySource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// AllocationRequest - 分配请求
// ==========================================
// 生命周期: 瞬态,不落库;提交成功后以 allocation_transaction 留痕
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    // ===== 关联 =====
    pub request_id: String, // 调用方关联标识（工单号/销售单号等）

    // ===== 需求定义 =====
    pub product_id: String,            // 产品编码
    pub quantity_needed: i64,          // 需求数量（> 0）
    pub business_context: BusinessContext, // 业务场景
    pub location_code: Option<String>, // 限定库位（None=不限）

    // ===== 解析级联输入 =====
    pub customer_tier: CustomerTier,       // 客户等级
    pub project_priority: ProjectPriority, // 项目优先级
    pub custom_strategy_id: Option<String>, // 申请方指定策略（级联第 1 级）
    pub category_id: Option<String>,       // 品类提示（品类级偏好查找用）
}

impl AllocationRequest {
    /// 请求参数校验
    pub fn validate(&self) -> Result<(), String> {
        if self.product_id.trim().is_empty() {
            return Err("product_id 不能为空".to_string());
        }
        if self.quantity_needed <= 0 {
            return Err(format!("quantity_needed 必须为正数: {}", self.quantity_needed));
        }
        if let Some(loc) = &self.location_code {
            if loc.trim().is_empty() {
                return Err("location_code 不能为空字符串".to_string());
            }
        }
        Ok(())
    }
}

// ==========================================
// PlanLine - 分配方案明细行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLine {
    pub seq: i32,                // 方案内顺序号（1 起）
    pub unit_id: String,         // 库存单元
    pub quantity_allocated: i64, // 该单元分得数量
    pub unit_cost: f64,          // 到岸单位成本（快照）
    pub score: Option<f64>,      // 综合得分（人工路径为 None）
    pub reason: String,          // 入选理由（本地化文案）
}

impl PlanLine {
    /// 行小计成本
    pub fn line_cost(&self) -> f64 {
        self.quantity_allocated as f64 * self.unit_cost
    }
}

// ==========================================
// AllocationPlan - 分配方案
// ==========================================
// 预览与执行共用结构; transaction_id 仅执行成功后非空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    // ===== 请求回显 =====
    pub request_id: String,
    pub product_id: String,
    pub location_code: Option<String>,
    pub business_context: BusinessContext,

    // ===== 数量与成本汇总 =====
    pub quantity_requested: i64,
    pub quantity_allocated: i64,
    pub total_cost: f64,
    pub average_unit_cost: f64,

    // ===== 明细（得分降序）=====
    pub lines: Vec<PlanLine>,

    // ===== 策略快照 =====
    pub strategy_id: Option<String>,   // 人工路径为 None
    pub strategy_name: Option<String>, // 策略名快照
    pub strategy_source: StrategySource, // 级联命中层级

    // ===== 建议（仅提示,不阻断）=====
    pub recommendations: Vec<String>,

    // ===== 提交信息 =====
    pub transaction_id: Option<String>, // 预览为 None
    pub planned_at: DateTime<Utc>,
}

impl AllocationPlan {
    /// 方案是否完整覆盖需求（守恒: Σ行数量 == 需求量）
    pub fn is_fully_allocated(&self) -> bool {
        self.quantity_allocated == self.quantity_requested
    }
}

// ==========================================
// ManualPick - 人工选择明细
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPick {
    pub unit_id: String,        // 指定单元
    pub quantity: i64,          // 指定数量（> 0）
    pub reason: Option<String>, // 操作员理由（缺省用本地化"人工指定"）
}

// ==========================================
// ManualSelection - 人工越权选择
// ==========================================
// 绕过解析与评分,但走同一预留提交协议
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualSelection {
    pub request_id: String,                // 调用方关联标识
    pub product_id: String,                // 产品编码
    pub location_code: String,             // 库位（人工选择必须明确库位）
    pub quantity_needed: i64,              // 需求数量（Σ picks 必须精确相等）
    pub business_context: BusinessContext, // 业务场景（事务留痕用）
    pub picks: Vec<ManualPick>,            // 选择明细
    pub operator: String,                  // 操作员
}

// ==========================================
// AllocationTransaction - 已提交分配事务
// ==========================================
// 执行成功后落库;预览不产生事务
// 对齐: db::init_schema allocation_transaction 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationTransaction {
    pub transaction_id: String,            // 事务 ID（UUID v4）
    pub request_id: String,                // 请求关联标识
    pub product_id: String,                // 产品编码
    pub location_code: String,             // 实际分配库位（不限库位时为 "*"）
    pub business_context: BusinessContext, // 业务场景
    pub strategy_id: Option<String>,       // 使用策略（人工路径为 None）
    pub strategy_source: StrategySource,   // 级联命中层级
    pub quantity_requested: i64,           // 请求数量
    pub quantity_allocated: i64,           // 实际分配数量
    pub total_cost: f64,                   // 总成本
    pub operator: String,                  // 操作员
    pub config_snapshot_json: Option<String>, // 提交时配置快照（JSON）
    pub committed_at: DateTime<Utc>,       // 提交时间
}

// ==========================================
// TransactionLine - 分配事务明细行
// ==========================================
// 对齐: db::init_schema allocation_line 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionLine {
    pub line_id: String,         // 明细行 ID（UUID v4）
    pub transaction_id: String,  // 关联事务
    pub seq: i32,                // 方案内顺序号
    pub unit_id: String,         // 库存单元
    pub quantity_allocated: i64, // 分得数量
    pub unit_cost: f64,          // 到岸单位成本（快照）
    pub score: Option<f64>,      // 综合得分（人工行为 None）
    pub reason: Option<String>,  // 入选理由
}
