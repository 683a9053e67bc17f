// ==========================================
// 库存分配引擎 - 策略领域模型
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3.2 策略与规则
// 依据: ERP_Alloc_Core_Spec.md - 4.1 策略解析级联
// ==========================================

use crate::domain::types::{
    BusinessContext, CriteriaKind, PreferenceScopeKind, SortDirection, StrategyKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 规则权重下限
pub const MIN_RULE_WEIGHT: f64 = 0.1;

/// 规则权重上限
pub const MAX_RULE_WEIGHT: f64 = 5.0;

// ==========================================
// AllocationStrategy - 分配策略
// ==========================================
// 红线: 解析时快照(克隆),在途分配不受并发编辑影响
// 对齐: db::init_schema allocation_strategy 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationStrategy {
    // ===== 主键 =====
    pub strategy_id: String, // 策略唯一标识

    // ===== 基础信息 =====
    pub strategy_name: String,        // 显示名称
    pub kind: StrategyKind,           // 策略类型
    pub description: Option<String>,  // 说明

    // ===== 状态与默认 =====
    pub is_active: bool,                          // 是否启用
    pub is_default: bool,                         // 是否为场景全局默认
    pub default_context: Option<BusinessContext>, // 作为默认时服务的业务场景

    // ===== 评分规则（priority 升序）=====
    pub rules: Vec<AllocationRule>,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

impl AllocationStrategy {
    /// 启用中的规则，按 priority 升序（平手再按准则名，保证遍历顺序稳定）
    pub fn active_rules(&self) -> Vec<&AllocationRule> {
        let mut rules: Vec<&AllocationRule> = self.rules.iter().filter(|r| r.is_active).collect();
        rules.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.criteria.to_db_str().cmp(b.criteria.to_db_str()))
        });
        rules
    }

    /// 是否具备参与解析的资格（启用且至少一条启用规则）
    pub fn is_resolvable(&self) -> bool {
        self.is_active && self.rules.iter().any(|r| r.is_active)
    }

    /// 结构校验（权重范围 + 准则唯一）
    pub fn validate(&self) -> Result<(), String> {
        let mut seen: Vec<CriteriaKind> = Vec::new();
        for rule in &self.rules {
            rule.validate()?;
            if seen.contains(&rule.criteria) {
                return Err(format!("策略 {} 准则重复: {}", self.strategy_id, rule.criteria));
            }
            seen.push(rule.criteria);
        }
        Ok(())
    }
}

// ==========================================
// AllocationRule - 策略评分规则
// ==========================================
// 对齐: db::init_schema allocation_rule 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRule {
    // ===== 主键与关联 =====
    pub rule_id: String,     // 规则唯一标识
    pub strategy_id: String, // 关联 allocation_strategy（FK）

    // ===== 评分定义 =====
    pub criteria: CriteriaKind,   // 评分准则（闭合枚举）
    pub weight: f64,              // 权重（0.1–5.0，归一化后加权，不要求总和为 1）
    pub direction: SortDirection, // Asc=越低越优 / Desc=越高越优
    pub priority: i32,            // 平手裁决顺序（越小越先）
    pub is_active: bool,          // 是否启用

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}

impl AllocationRule {
    /// 权重范围校验
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_RULE_WEIGHT..=MAX_RULE_WEIGHT).contains(&self.weight) {
            return Err(format!(
                "规则 {} 权重越界: {} (允许 {}–{})",
                self.rule_id, self.weight, MIN_RULE_WEIGHT, MAX_RULE_WEIGHT
            ));
        }
        Ok(())
    }
}

// ==========================================
// AllocationPreference - 分配偏好
// ==========================================
// 作用域: 产品级优先于品类级;子规则在 engine::resolver 按序判定
// 对齐: db::init_schema allocation_preference 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPreference {
    // ===== 主键与作用域 =====
    pub preference_id: String,          // 偏好唯一标识
    pub scope_kind: PreferenceScopeKind, // PRODUCT/CATEGORY
    pub scope_id: String,               // product_id 或 category_id

    // ===== 子规则策略指派 =====
    pub premium_customer_strategy_id: Option<String>, // 高端客户策略
    pub high_value_strategy_id: Option<String>,       // 高货值策略
    pub high_value_threshold: Option<f64>,            // 高货值判定阈值（请求估值 > 阈值）
    pub critical_project_strategy_id: Option<String>, // 关键项目策略
    pub default_strategy_id: Option<String>,          // 作用域默认策略

    // ===== 状态 =====
    pub is_active: bool,

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>, // 记录创建时间
    pub updated_at: DateTime<Utc>, // 记录更新时间
}
