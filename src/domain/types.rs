// ==========================================
// 库存分配引擎 - 领域类型定义
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 3. 数据模型
// 依据: ERP_Alloc_Core_Spec.md - 4.1 策略解析级联
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 库存单元状态 (Unit Status)
// ==========================================
// 红线: 单元只做状态流转,从不删除
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Available,   // 可分配
    Reserved,    // 预留中 (执行期瞬态)
    Allocated,   // 已分配耗尽
    Unavailable, // 不可用 (维修/封存)
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl UnitStatus {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Some(UnitStatus::Available),
            "RESERVED" => Some(UnitStatus::Reserved),
            "ALLOCATED" => Some(UnitStatus::Allocated),
            "UNAVAILABLE" => Some(UnitStatus::Unavailable),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "AVAILABLE",
            UnitStatus::Reserved => "RESERVED",
            UnitStatus::Allocated => "ALLOCATED",
            UnitStatus::Unavailable => "UNAVAILABLE",
        }
    }
}

// ==========================================
// 性能评级 (Performance Rating)
// ==========================================
// 无评级在单元层为 None (序数映射取 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PerformanceRating {
    Excellent, // 优
    Good,      // 良
    Average,   // 中
    Poor,      // 差
}

impl fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PerformanceRating {
    /// 从字符串解析评级
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "EXCELLENT" => Some(PerformanceRating::Excellent),
            "GOOD" => Some(PerformanceRating::Good),
            "AVERAGE" => Some(PerformanceRating::Average),
            "POOR" => Some(PerformanceRating::Poor),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PerformanceRating::Excellent => "EXCELLENT",
            PerformanceRating::Good => "GOOD",
            PerformanceRating::Average => "AVERAGE",
            PerformanceRating::Poor => "POOR",
        }
    }

    /// 评分用序数映射 (优=100, 良=75, 中=50, 差=25; 无评级=0 由调用方处理)
    pub fn ordinal_score(&self) -> f64 {
        match self {
            PerformanceRating::Excellent => 100.0,
            PerformanceRating::Good => 75.0,
            PerformanceRating::Average => 50.0,
            PerformanceRating::Poor => 25.0,
        }
    }
}

// ==========================================
// 业务场景 (Business Context)
// ==========================================
// 申请来源场景,用于全局默认策略匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BusinessContext {
    Estimation,    // 估价/报价
    Manufacturing, // 生产领用
    Sales,         // 销售发货
}

impl fmt::Display for BusinessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl BusinessContext {
    /// 从字符串解析业务场景
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ESTIMATION" => Some(BusinessContext::Estimation),
            "MANUFACTURING" => Some(BusinessContext::Manufacturing),
            "SALES" => Some(BusinessContext::Sales),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            BusinessContext::Estimation => "ESTIMATION",
            BusinessContext::Manufacturing => "MANUFACTURING",
            BusinessContext::Sales => "SALES",
        }
    }
}

// ==========================================
// 客户等级 (Customer Tier)
// ==========================================
// 顺序: Standard < Gold < Premium
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerTier {
    Standard, // 普通
    Gold,     // 金卡
    Premium,  // 高端
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerTier::Standard => write!(f, "STANDARD"),
            CustomerTier::Gold => write!(f, "GOLD"),
            CustomerTier::Premium => write!(f, "PREMIUM"),
        }
    }
}

// ==========================================
// 项目优先级 (Project Priority)
// ==========================================
// 顺序: Normal < High < Critical
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectPriority {
    Normal,   // 常规
    High,     // 重点
    Critical, // 关键
}

impl fmt::Display for ProjectPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectPriority::Normal => write!(f, "NORMAL"),
            ProjectPriority::High => write!(f, "HIGH"),
            ProjectPriority::Critical => write!(f, "CRITICAL"),
        }
    }
}

// ==========================================
// 策略类型 (Strategy Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    CostOptimization,     // 成本优先
    WarrantyOptimization, // 质保优先
    InventoryRotation,    // 库存周转 (先进先出)
    Custom,               // 自定义权重组合
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl StrategyKind {
    /// 从字符串解析策略类型
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "COST_OPTIMIZATION" => Some(StrategyKind::CostOptimization),
            "WARRANTY_OPTIMIZATION" => Some(StrategyKind::WarrantyOptimization),
            "INVENTORY_ROTATION" => Some(StrategyKind::InventoryRotation),
            "CUSTOM" => Some(StrategyKind::Custom),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StrategyKind::CostOptimization => "COST_OPTIMIZATION",
            StrategyKind::WarrantyOptimization => "WARRANTY_OPTIMIZATION",
            StrategyKind::InventoryRotation => "INVENTORY_ROTATION",
            StrategyKind::Custom => "CUSTOM",
        }
    }
}

// ==========================================
// 评分准则 (Criteria Kind)
// ==========================================
// 红线: 闭合枚举,不接受自由字符串准则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CriteriaKind {
    UnitCost,              // 到岸单位成本
    WarrantyRemainingDays, // 质保剩余天数
    AgeDays,               // 库龄天数
    PerformanceRating,     // 性能评级序数
    FailureCount,          // 历史故障次数
}

impl fmt::Display for CriteriaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl CriteriaKind {
    /// 从字符串解析评分准则
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "UNIT_COST" => Some(CriteriaKind::UnitCost),
            "WARRANTY_REMAINING_DAYS" => Some(CriteriaKind::WarrantyRemainingDays),
            "AGE_DAYS" => Some(CriteriaKind::AgeDays),
            "PERFORMANCE_RATING" => Some(CriteriaKind::PerformanceRating),
            "FAILURE_COUNT" => Some(CriteriaKind::FailureCount),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            CriteriaKind::UnitCost => "UNIT_COST",
            CriteriaKind::WarrantyRemainingDays => "WARRANTY_REMAINING_DAYS",
            CriteriaKind::AgeDays => "AGE_DAYS",
            CriteriaKind::PerformanceRating => "PERFORMANCE_RATING",
            CriteriaKind::FailureCount => "FAILURE_COUNT",
        }
    }
}

// ==========================================
// 排序方向 (Sort Direction)
// ==========================================
// Asc: 原始值越低越优; Desc: 原始值越高越优
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl SortDirection {
    /// 从字符串解析排序方向
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ASC" => Some(SortDirection::Asc),
            "DESC" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// ==========================================
// 偏好作用域 (Preference Scope Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreferenceScopeKind {
    Product,  // 产品级
    Category, // 品类级
}

impl fmt::Display for PreferenceScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PreferenceScopeKind {
    /// 从字符串解析作用域
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PRODUCT" => Some(PreferenceScopeKind::Product),
            "CATEGORY" => Some(PreferenceScopeKind::Category),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PreferenceScopeKind::Product => "PRODUCT",
            PreferenceScopeKind::Category => "CATEGORY",
        }
    }
}

// ==========================================
// 策略来源 (Strategy Source)
// ==========================================
// 记录解析级联命中的层级,随分配事务落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategySource {
    Custom,             // 申请方指定
    ProductPreference,  // 产品级偏好
    CategoryPreference, // 品类级偏好
    GlobalDefault,      // 场景全局默认
    Manual,             // 人工选择 (绕过解析)
}

impl fmt::Display for StrategySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl StrategySource {
    /// 从字符串解析策略来源
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CUSTOM" => Some(StrategySource::Custom),
            "PRODUCT_PREFERENCE" => Some(StrategySource::ProductPreference),
            "CATEGORY_PREFERENCE" => Some(StrategySource::CategoryPreference),
            "GLOBAL_DEFAULT" => Some(StrategySource::GlobalDefault),
            "MANUAL" => Some(StrategySource::Manual),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            StrategySource::Custom => "CUSTOM",
            StrategySource::ProductPreference => "PRODUCT_PREFERENCE",
            StrategySource::CategoryPreference => "CATEGORY_PREFERENCE",
            StrategySource::GlobalDefault => "GLOBAL_DEFAULT",
            StrategySource::Manual => "MANUAL",
        }
    }
}
