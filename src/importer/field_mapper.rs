// ==========================================
// 库存分配引擎 - 字段映射器实现
// ==========================================
// 依据: Inventory_Field_Mapping_v0.1.md - 入库字段映射表
// 职责: 源列名 → 标准字段映射 + 类型转换
// ==========================================
// 行级类型问题不中断整批: 记 DqViolation,去留由 DQ 校验统一裁决
// ==========================================

use crate::domain::types::PerformanceRating;
use crate::domain::unit::{DqLevel, DqViolation, RawUnitRecord};
use crate::i18n::t_with_args;
use chrono::NaiveDate;
use std::collections::HashMap;

pub struct UnitFieldMapper;

impl UnitFieldMapper {
    /// 映射一行源数据为 RawUnitRecord
    ///
    /// # 返回
    /// - (record, violations): 解析失败的字段置 None 并产出对应违规
    ///   - 必填数值/日期解析失败 → ERROR（该行最终被 DQ 阻断）
    ///   - 可选字段解析失败 → WARNING（该行仍可导入,字段按缺省处理）
    pub fn map_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> (RawUnitRecord, Vec<DqViolation>) {
        let mut violations = Vec::new();
        let unit_id = self.get_string(row, "unit_id");

        let quantity_received = self.parse_i64(
            row,
            "quantity_received",
            row_number,
            &unit_id,
            DqLevel::Error,
            &mut violations,
        );
        let unit_cost = self.parse_f64(
            row,
            "unit_cost",
            row_number,
            &unit_id,
            DqLevel::Error,
            &mut violations,
        );
        let acquisition_date = self.parse_date(
            row,
            "acquisition_date",
            row_number,
            &unit_id,
            DqLevel::Error,
            &mut violations,
        );
        let warranty_expiry_date = self.parse_date(
            row,
            "warranty_expiry_date",
            row_number,
            &unit_id,
            DqLevel::Warning,
            &mut violations,
        );
        let failure_count = self.parse_i64(
            row,
            "failure_count",
            row_number,
            &unit_id,
            DqLevel::Warning,
            &mut violations,
        );
        let performance_rating =
            self.parse_rating(row, row_number, &unit_id, &mut violations);

        let record = RawUnitRecord {
            unit_id,
            product_id: self.get_string(row, "product_id"),
            location_code: self.get_string(row, "location_code").map(|s| s.to_uppercase()),
            batch_no: self.get_string(row, "batch_no"),
            quantity_received,
            unit_cost,
            acquisition_date,
            warranty_expiry_date,
            performance_rating,
            failure_count,
            row_number,
        };

        (record, violations)
    }

    /// 提取字符串字段（空白 → None），支持中英文列名别名
    fn get_string(&self, row: &HashMap<String, String>, key: &str) -> Option<String> {
        let aliases: Vec<&str> = match key {
            "unit_id" => vec!["unit_id", "单元号", "序列号"],
            "product_id" => vec!["product_id", "产品编码", "物料编码"],
            "location_code" => vec!["location_code", "库位", "库位编码"],
            "batch_no" => vec!["batch_no", "批次号", "采购批次"],
            "quantity_received" => vec!["quantity_received", "quantity", "入库数量", "数量"],
            "unit_cost" => vec!["unit_cost", "cost", "单位成本", "到岸成本"],
            "acquisition_date" => vec!["acquisition_date", "入库日期"],
            "warranty_expiry_date" => vec!["warranty_expiry_date", "warranty_expiry", "质保到期日"],
            "performance_rating" => vec!["performance_rating", "rating", "性能评级"],
            "failure_count" => vec!["failure_count", "failures", "故障次数"],
            _ => vec![key],
        };

        for alias in aliases {
            if let Some(v) = row.get(alias) {
                let trimmed = v.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
        None
    }

    fn parse_i64(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
        unit_id: &Option<String>,
        level: DqLevel,
        violations: &mut Vec<DqViolation>,
    ) -> Option<i64> {
        let value = self.get_string(row, key)?;
        match value.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                violations.push(DqViolation {
                    row_number,
                    unit_id: unit_id.clone(),
                    level,
                    field: key.to_string(),
                    message: t_with_args(
                        "import.invalid_number",
                        &[("field", key), ("value", &value)],
                    ),
                });
                None
            }
        }
    }

    fn parse_f64(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
        unit_id: &Option<String>,
        level: DqLevel,
        violations: &mut Vec<DqViolation>,
    ) -> Option<f64> {
        let value = self.get_string(row, key)?;
        match value.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                violations.push(DqViolation {
                    row_number,
                    unit_id: unit_id.clone(),
                    level,
                    field: key.to_string(),
                    message: t_with_args(
                        "import.invalid_number",
                        &[("field", key), ("value", &value)],
                    ),
                });
                None
            }
        }
    }

    /// 解析日期（YYYY-MM-DD，兼容 YYYYMMDD）
    fn parse_date(
        &self,
        row: &HashMap<String, String>,
        key: &str,
        row_number: usize,
        unit_id: &Option<String>,
        level: DqLevel,
        violations: &mut Vec<DqViolation>,
    ) -> Option<NaiveDate> {
        let value = self.get_string(row, key)?;
        let parsed = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&value, "%Y%m%d"));

        match parsed {
            Ok(date) => Some(date),
            Err(_) => {
                violations.push(DqViolation {
                    row_number,
                    unit_id: unit_id.clone(),
                    level,
                    field: key.to_string(),
                    message: t_with_args(
                        "import.invalid_date",
                        &[("field", key), ("value", &value)],
                    ),
                });
                None
            }
        }
    }

    /// 解析性能评级（未知值降级为 WARNING,字段按无评级处理）
    fn parse_rating(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
        unit_id: &Option<String>,
        violations: &mut Vec<DqViolation>,
    ) -> Option<PerformanceRating> {
        let value = self.get_string(row, "performance_rating")?;
        match PerformanceRating::from_str(&value) {
            Some(rating) => Some(rating),
            None => {
                violations.push(DqViolation {
                    row_number,
                    unit_id: unit_id.clone(),
                    level: DqLevel::Warning,
                    field: "performance_rating".to_string(),
                    message: t_with_args("import.unknown_rating", &[("value", &value)]),
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_map_row_basic() {
        let mapper = UnitFieldMapper;
        let (record, violations) = mapper.map_row(
            &row(&[
                ("unit_id", "SN-001"),
                ("product_id", "P-001"),
                ("location_code", "wh-01"),
                ("quantity_received", "1"),
                ("unit_cost", "1250.50"),
                ("acquisition_date", "2025-11-20"),
                ("performance_rating", "GOOD"),
            ]),
            1,
        );

        assert!(violations.is_empty());
        assert_eq!(record.unit_id, Some("SN-001".to_string()));
        assert_eq!(record.location_code, Some("WH-01".to_string()));
        assert_eq!(record.quantity_received, Some(1));
        assert_eq!(record.unit_cost, Some(1250.50));
        assert_eq!(
            record.acquisition_date,
            Some(NaiveDate::from_ymd_opt(2025, 11, 20).unwrap())
        );
        assert_eq!(record.performance_rating, Some(PerformanceRating::Good));
    }

    #[test]
    fn test_map_row_chinese_headers() {
        let mapper = UnitFieldMapper;
        let (record, violations) = mapper.map_row(
            &row(&[
                ("序列号", "SN-002"),
                ("产品编码", "P-002"),
                ("库位", "WH-02"),
                ("入库数量", "10"),
                ("到岸成本", "88.0"),
                ("入库日期", "20251120"),
            ]),
            1,
        );

        assert!(violations.is_empty());
        assert_eq!(record.unit_id, Some("SN-002".to_string()));
        assert_eq!(record.quantity_received, Some(10));
        assert_eq!(
            record.acquisition_date,
            Some(NaiveDate::from_ymd_opt(2025, 11, 20).unwrap())
        );
    }

    #[test]
    fn test_map_row_invalid_required_number_is_error() {
        let mapper = UnitFieldMapper;
        let (record, violations) = mapper.map_row(
            &row(&[
                ("unit_id", "SN-003"),
                ("quantity_received", "abc"),
            ]),
            7,
        );

        assert_eq!(record.quantity_received, None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].level, DqLevel::Error);
        assert_eq!(violations[0].field, "quantity_received");
        assert_eq!(violations[0].row_number, 7);
    }

    #[test]
    fn test_map_row_unknown_rating_is_warning() {
        let mapper = UnitFieldMapper;
        let (record, violations) = mapper.map_row(
            &row(&[("unit_id", "SN-004"), ("performance_rating", "超神")]),
            2,
        );

        assert_eq!(record.performance_rating, None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].level, DqLevel::Warning);
    }

    #[test]
    fn test_map_row_blank_optional_fields_silent() {
        let mapper = UnitFieldMapper;
        let (record, violations) = mapper.map_row(
            &row(&[("unit_id", "SN-005"), ("batch_no", "  "), ("warranty_expiry_date", "")]),
            3,
        );

        assert!(violations.is_empty());
        assert_eq!(record.batch_no, None);
        assert_eq!(record.warranty_expiry_date, None);
    }
}
