// ==========================================
// 库存分配引擎 - 导入层
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 9. 库存接入
// ==========================================
// 职责: 外部入库数据导入,生成库存单元
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod unit_importer;
pub mod unit_importer_impl;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use field_mapper::UnitFieldMapper;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use unit_importer_impl::UnitImporterImpl;

// 重导出 Trait 接口
pub use unit_importer::{FileParser, UnitImporter};
