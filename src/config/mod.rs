// ==========================================
// 库存分配引擎 - 配置层
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 6. 建议项阈值 / 8. 环境与配置
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
