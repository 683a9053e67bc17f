// ==========================================
// 库存分配引擎 - 库存单元领域模型
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3.1 库存单元
// 依据: Inventory_Field_Mapping_v0.1.md - 入库字段映射
// ==========================================

use crate::domain::types::{PerformanceRating, UnitStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// InventoryUnit - 库存单元
// ==========================================
// 红线: 只做状态流转,从不删除;数量仅经预留协议变更
// 用途: 导入层/入库写入,分配引擎读取与预留
// 对齐: db::init_schema inventory_unit 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUnit {
    // ===== 主键 =====
    pub unit_id: String, // 单元唯一标识（序列号或批次行号）

    // ===== 归属信息 =====
    pub product_id: String,        // 产品编码
    pub location_code: String,     // 库位编码
    pub batch_no: Option<String>,  // 采购批次号

    // ===== 数量维度 =====
    pub quantity_received: i64,  // 入库数量（序列化单元恒为 1）
    pub quantity_available: i64, // 当前可分配数量（预留协议唯一写入口）

    // ===== 成本与寿命维度 =====
    pub unit_cost: f64,                          // 到岸单位成本
    pub acquisition_date: NaiveDate,             // 入库日期
    pub warranty_expiry_date: Option<NaiveDate>, // 质保到期日（无质保为 None）
    pub performance_rating: Option<PerformanceRating>, // 性能评级（无评级为 None）
    pub failure_count: i64,                      // 历史故障次数（>= 0）

    // ===== 状态 =====
    pub status: UnitStatus, // AVAILABLE/RESERVED/ALLOCATED/UNAVAILABLE

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,  // 记录创建时间
    pub updated_at: DateTime<Utc>,  // 记录更新时间
    pub updated_by: Option<String>, // 操作人/系统标识
}

impl InventoryUnit {
    /// 质保剩余天数（无质保或已过期 → 0，不出现负值）
    pub fn warranty_remaining_days(&self, today: NaiveDate) -> i64 {
        match self.warranty_expiry_date {
            Some(expiry) => (expiry - today).num_days().max(0),
            None => 0,
        }
    }

    /// 库龄天数（入库日在未来时截断为 0）
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.acquisition_date).num_days().max(0)
    }

    /// 性能评级序数（优=100, 良=75, 中=50, 差=25, 无评级=0）
    pub fn rating_ordinal(&self) -> f64 {
        self.performance_rating
            .map(|r| r.ordinal_score())
            .unwrap_or(0.0)
    }

    /// 是否可参与分配（状态可用且有剩余数量）
    pub fn is_allocatable(&self) -> bool {
        self.status == UnitStatus::Available && self.quantity_available > 0
    }
}

// ==========================================
// RawUnitRecord - 入库导入中间结构体
// ==========================================
// 用途: 导入管道中间产物（文件解析 → 字段映射 → 此结构）
// 生命周期: 仅在导入流程内
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawUnitRecord {
    // 源字段（已类型转换）
    pub unit_id: Option<String>,
    pub product_id: Option<String>,
    pub location_code: Option<String>,
    pub batch_no: Option<String>,
    pub quantity_received: Option<i64>,
    pub unit_cost: Option<f64>,
    pub acquisition_date: Option<NaiveDate>,
    pub warranty_expiry_date: Option<NaiveDate>,
    pub performance_rating: Option<PerformanceRating>,
    pub failure_count: Option<i64>,

    // 元信息
    pub row_number: usize, // 原始文件行号（用于 DQ 报告）
}

// ==========================================
// DqLevel - 数据质量级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DqLevel {
    Error,   // 错误（阻断该行导入）
    Warning, // 警告（允许导入）
}

// ==========================================
// DqViolation - 数据质量违规记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize,       // 原始文件行号
    pub unit_id: Option<String>, // 单元标识（如果可解析）
    pub level: DqLevel,          // 违规级别
    pub field: String,           // 违规字段
    pub message: String,         // 违规描述
}

// ==========================================
// DqSummary - 数据质量汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqSummary {
    pub total_rows: usize, // 总行数
    pub accepted: usize,   // 通过（含警告行）
    pub rejected: usize,   // 阻断（ERROR）
    pub warning: usize,    // 警告（WARNING）
}

// ==========================================
// ImportOutcome - 入库导入结果
// ==========================================
// 用途: 导入接口返回值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub batch_id: String,             // 批次 ID（UUID）
    pub file_name: Option<String>,    // 源文件名
    pub inserted: usize,              // 新增单元数
    pub updated: usize,               // 更新单元数
    pub summary: DqSummary,           // 汇总统计
    pub violations: Vec<DqViolation>, // 违规明细
    pub elapsed_ms: i64,              // 导入耗时（毫秒）
}
