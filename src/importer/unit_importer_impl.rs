// ==========================================
// 库存分配引擎 - 入库导入器实现
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 9. 库存接入
// 依据: Inventory_Field_Mapping_v0.1.md - 入库字段映射表
// ==========================================
// 职责: 整合导入流程，从文件到数据库
// 流程: 解析 → 映射 → DQ 校验 → 落库
// ==========================================
// 红线: ERROR 违规只阻断所在行,不阻断整批;落库单事务
// ==========================================

use crate::domain::types::UnitStatus;
use crate::domain::unit::{DqLevel, DqSummary, DqViolation, ImportOutcome, InventoryUnit, RawUnitRecord};
use crate::i18n::t_with_args;
use crate::importer::error::ImportResult;
use crate::importer::field_mapper::UnitFieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::unit_importer::UnitImporter;
use crate::repository::UnitRepository;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// UnitImporterImpl - 入库导入器实现
// ==========================================
pub struct UnitImporterImpl {
    units: Arc<UnitRepository>,
    parser: UniversalFileParser,
    mapper: UnitFieldMapper,
}

impl UnitImporterImpl {
    pub fn new(units: Arc<UnitRepository>) -> Self {
        Self {
            units,
            parser: UniversalFileParser,
            mapper: UnitFieldMapper,
        }
    }

    /// 行级 DQ 校验（必填字段 + 非负约束）
    ///
    /// 映射阶段已产出违规的字段不再重复报缺失
    fn validate_record(&self, record: &RawUnitRecord, violations: &mut Vec<DqViolation>) {
        let already_flagged: HashSet<String> =
            violations.iter().map(|v| v.field.clone()).collect();

        let required: [(&str, bool); 6] = [
            ("unit_id", record.unit_id.is_none()),
            ("product_id", record.product_id.is_none()),
            ("location_code", record.location_code.is_none()),
            ("quantity_received", record.quantity_received.is_none()),
            ("unit_cost", record.unit_cost.is_none()),
            ("acquisition_date", record.acquisition_date.is_none()),
        ];
        for (field, missing) in required {
            if missing && !already_flagged.contains(field) {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    unit_id: record.unit_id.clone(),
                    level: DqLevel::Error,
                    field: field.to_string(),
                    message: t_with_args("import.missing_required_field", &[("field", field)]),
                });
            }
        }

        if let Some(qty) = record.quantity_received {
            if qty < 0 {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    unit_id: record.unit_id.clone(),
                    level: DqLevel::Error,
                    field: "quantity_received".to_string(),
                    message: t_with_args(
                        "import.negative_quantity",
                        &[("field", "quantity_received"), ("value", &qty.to_string())],
                    ),
                });
            }
        }
        if let Some(cost) = record.unit_cost {
            if cost < 0.0 {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    unit_id: record.unit_id.clone(),
                    level: DqLevel::Error,
                    field: "unit_cost".to_string(),
                    message: t_with_args(
                        "import.negative_quantity",
                        &[("field", "unit_cost"), ("value", &cost.to_string())],
                    ),
                });
            }
        }
        // 故障次数为描述性字段: 负值降级为 WARNING,落库按 0 处理
        if let Some(failures) = record.failure_count {
            if failures < 0 {
                violations.push(DqViolation {
                    row_number: record.row_number,
                    unit_id: record.unit_id.clone(),
                    level: DqLevel::Warning,
                    field: "failure_count".to_string(),
                    message: t_with_args(
                        "import.negative_quantity",
                        &[("field", "failure_count"), ("value", &failures.to_string())],
                    ),
                });
            }
        }
    }

    /// 校验通过的行转换为库存单元
    ///
    /// 必填字段在 DQ 阶段已保证非空,此处缺失直接跳过该行
    fn build_unit(&self, record: &RawUnitRecord, operator: &str) -> Option<InventoryUnit> {
        let unit_id = record.unit_id.clone()?;
        let product_id = record.product_id.clone()?;
        let location_code = record.location_code.clone()?;
        let quantity_received = record.quantity_received?;
        let unit_cost = record.unit_cost?;
        let acquisition_date = record.acquisition_date?;

        let now = Utc::now();
        Some(InventoryUnit {
            unit_id,
            product_id,
            location_code,
            batch_no: record.batch_no.clone(),
            quantity_received,
            quantity_available: quantity_received,
            unit_cost,
            acquisition_date,
            warranty_expiry_date: record.warranty_expiry_date,
            performance_rating: record.performance_rating,
            failure_count: record.failure_count.unwrap_or(0).max(0),
            status: UnitStatus::Available,
            created_at: now,
            updated_at: now,
            updated_by: Some(operator.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl UnitImporter for UnitImporterImpl {
    #[instrument(skip(self, file_path), fields(batch_id))]
    async fn import_from_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        operator: &str,
    ) -> ImportResult<ImportOutcome> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        let file_name = file_path
            .as_ref()
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.to_string());

        info!(
            batch_id = %batch_id,
            file = %file_name.as_deref().unwrap_or("unknown"),
            "开始导入库存单元数据"
        );

        // === 步骤 1: 解析文件 ===
        debug!("步骤 1: 解析文件");
        let raw_rows = self.parser.parse(file_path.as_ref()).map_err(|e| {
            error!(error = %e, "文件解析失败");
            e
        })?;
        let total_rows = raw_rows.len();
        info!(total_rows = total_rows, "文件解析完成");

        // === 步骤 2: 字段映射 ===
        debug!("步骤 2: 字段映射");
        let mut rows: Vec<(RawUnitRecord, Vec<DqViolation>)> = Vec::with_capacity(total_rows);
        for (idx, row) in raw_rows.into_iter().enumerate() {
            // 表头占第 1 行,数据行号从 2 起算
            let (record, violations) = self.mapper.map_row(&row, idx + 2);
            rows.push((record, violations));
        }
        debug!("字段映射完成");

        // === 步骤 3: DQ 校验 ===
        debug!("步骤 3: DQ 校验");
        let mut seen_unit_ids: HashSet<String> = HashSet::new();
        for (record, violations) in rows.iter_mut() {
            self.validate_record(record, violations);
            if let Some(unit_id) = &record.unit_id {
                if !seen_unit_ids.insert(unit_id.clone()) {
                    violations.push(DqViolation {
                        row_number: record.row_number,
                        unit_id: Some(unit_id.clone()),
                        level: DqLevel::Error,
                        field: "unit_id".to_string(),
                        message: t_with_args("import.duplicate_unit", &[("unit_id", unit_id)]),
                    });
                }
            }
        }

        let mut units = Vec::new();
        let mut rejected = 0usize;
        let mut warning_rows = 0usize;
        let mut all_violations = Vec::new();
        for (record, violations) in rows {
            let has_error = violations.iter().any(|v| v.level == DqLevel::Error);
            if has_error {
                rejected += 1;
                warn!(
                    row_number = record.row_number,
                    unit_id = %record.unit_id.as_deref().unwrap_or("?"),
                    "行被 DQ 阻断"
                );
            } else {
                if violations.iter().any(|v| v.level == DqLevel::Warning) {
                    warning_rows += 1;
                }
                if let Some(unit) = self.build_unit(&record, operator) {
                    units.push(unit);
                }
            }
            all_violations.extend(violations);
        }
        info!(
            accepted = units.len(),
            rejected = rejected,
            warning = warning_rows,
            "DQ 校验完成"
        );

        // === 步骤 4: 批量落库（单事务） ===
        debug!("步骤 4: 批量落库");
        let (inserted, updated) = self.units.batch_upsert_units(&units)?;
        info!(inserted = inserted, updated = updated, "落库完成");

        let elapsed_ms = start_time.elapsed().as_millis() as i64;
        let outcome = ImportOutcome {
            batch_id: batch_id.clone(),
            file_name,
            inserted,
            updated,
            summary: DqSummary {
                total_rows,
                accepted: units.len(),
                rejected,
                warning: warning_rows,
            },
            violations: all_violations,
            elapsed_ms,
        };

        info!(
            batch_id = %batch_id,
            inserted = inserted,
            updated = updated,
            rejected = rejected,
            elapsed_ms = elapsed_ms,
            "库存单元导入完成"
        );
        Ok(outcome)
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        operator: &str,
    ) -> ImportResult<Vec<Result<ImportOutcome, String>>> {
        let total = file_paths.len();
        info!(files = total, "开始批量导入");

        let mut results = Vec::with_capacity(total);
        for file_path in file_paths {
            match self.import_from_file(file_path.as_ref(), operator).await {
                Ok(outcome) => results.push(Ok(outcome)),
                Err(e) => {
                    warn!(error = %e, "批量导入中单个文件失败");
                    results.push(Err(e.to_string()));
                }
            }
        }

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(files = total, failed = failed, "批量导入完成");
        Ok(results)
    }
}
