// ==========================================
// 库存分配引擎 - 入库导入接口
// ==========================================
// 职责: 定义入库导入接口（不包含实现）
// ==========================================

use crate::domain::unit::ImportOutcome;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// UnitImporter Trait
// ==========================================
// 用途: 入库导入主接口
// 实现者: UnitImporterImpl
#[async_trait]
pub trait UnitImporter: Send + Sync {
    /// 从文件导入库存单元数据（按扩展名自动选择解析器）
    ///
    /// # 参数
    /// - file_path: 文件路径（.csv/.xlsx/.xls）
    /// - operator: 操作人（写入审计字段）
    ///
    /// # 返回
    /// - Ok(ImportOutcome): 导入结果（批次信息、DQ 汇总、违规明细）
    /// - Err: 文件级失败（不存在/格式/落库）
    ///
    /// # 导入流程
    /// 1. 文件解析（表头 + 数据行）
    /// 2. 字段映射与类型转换（行级失败转违规记录）
    /// 3. DQ 校验（必填/非负/重复主键；ERROR 阻断该行）
    /// 4. 批量落库（单事务；已有单元只更新描述性字段）
    async fn import_from_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        operator: &str,
    ) -> ImportResult<ImportOutcome>;

    /// 批量导入多个文件
    ///
    /// # 说明
    /// - 每个文件独立导入,单个失败不影响其余文件
    /// - 失败项以错误文本返回,便于界面逐条展示
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        operator: &str,
    ) -> ImportResult<Vec<Result<ImportOutcome, String>>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（HashMap<列名, 值>）
    ///
    /// 表头取第一行,全空白行跳过,值两端空白去除
    fn parse_to_raw_records(
        &self,
        file_path: &Path,
    ) -> ImportResult<Vec<HashMap<String, String>>>;
}
