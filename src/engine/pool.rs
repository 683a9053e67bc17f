// ==========================================
// 库存分配引擎 - 库存池接口
// ==========================================
// 依据: ERP_Alloc_Core_Spec.md - 2. 组件表 / 9. 重设计说明
// ==========================================
// 职责: 分配引擎面向的存储接口(显式注入,可用内存实现做引擎级测试)
// 红线: 数量扣减只经 try_reserve/release,绝不直写
// ==========================================

use crate::domain::allocation::{AllocationTransaction, TransactionLine};
use crate::domain::types::UnitStatus;
use crate::domain::unit::InventoryUnit;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

// ==========================================
// InventoryPool - 库存池接口
// ==========================================
pub trait InventoryPool: Send + Sync {
    /// 列出某产品可分配单元（AVAILABLE 且余量 > 0），unit_id 升序
    fn list_available(
        &self,
        product_id: &str,
        location_code: Option<&str>,
    ) -> RepositoryResult<Vec<InventoryUnit>>;

    /// 列出某产品全部单元（不筛状态；历史均价口径用）
    fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<InventoryUnit>>;

    /// 按 unit_id 查询单元
    fn get_unit(&self, unit_id: &str) -> RepositoryResult<Option<InventoryUnit>>;

    /// 条件预留（CAS 等价）
    ///
    /// 单元 AVAILABLE 且余量充足时原子扣减，抽干则翻 RESERVED。
    ///
    /// # 返回
    /// - Ok(true): 预留成功
    /// - Ok(false): 前置条件丢失（并发抢占或状态变化），调用方按冲突处理
    fn try_reserve(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<bool>;

    /// 释放预留：余量恢复，RESERVED 回到 AVAILABLE
    fn release(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<()>;

    /// 提交定格：被抽干的 RESERVED 单元翻 ALLOCATED
    ///
    /// # 返回
    /// - Ok(usize): 实际翻转的单元数（未抽干的单元保持 AVAILABLE，不计入）
    fn finalize_allocated(&self, unit_ids: &[String], operator: &str) -> RepositoryResult<usize>;
}

// ==========================================
// AllocationHistory - 分配事务留痕接口
// ==========================================
pub trait AllocationHistory: Send + Sync {
    /// 落库已提交事务（头 + 明细行，单事务）
    fn record(&self, txn: &AllocationTransaction, lines: &[TransactionLine])
        -> RepositoryResult<()>;
}

// ==========================================
// MemoryInventoryPool - 内存库存池
// ==========================================
// 用途: 引擎单元测试/演示;与 SQLite 实现遵守同一预留协议
pub struct MemoryInventoryPool {
    units: Mutex<HashMap<String, InventoryUnit>>,
    history: Mutex<Vec<(AllocationTransaction, Vec<TransactionLine>)>>,
}

impl MemoryInventoryPool {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(HashMap::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// 以初始单元集构建
    pub fn with_units(units: Vec<InventoryUnit>) -> Self {
        let pool = Self::new();
        {
            let mut map = pool.units.lock().unwrap_or_else(|e| e.into_inner());
            for unit in units {
                map.insert(unit.unit_id.clone(), unit);
            }
        }
        pool
    }

    /// 插入/覆盖单元（测试初始化用）
    pub fn put_unit(&self, unit: InventoryUnit) -> RepositoryResult<()> {
        let mut map = self.lock_units()?;
        map.insert(unit.unit_id.clone(), unit);
        Ok(())
    }

    /// 已留痕事务快照（测试断言用）
    pub fn recorded_transactions(
        &self,
    ) -> RepositoryResult<Vec<(AllocationTransaction, Vec<TransactionLine>)>> {
        let history = self
            .history
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(history.clone())
    }

    fn lock_units(
        &self,
    ) -> RepositoryResult<std::sync::MutexGuard<'_, HashMap<String, InventoryUnit>>> {
        self.units
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl Default for MemoryInventoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryPool for MemoryInventoryPool {
    fn list_available(
        &self,
        product_id: &str,
        location_code: Option<&str>,
    ) -> RepositoryResult<Vec<InventoryUnit>> {
        let map = self.lock_units()?;
        let mut units: Vec<InventoryUnit> = map
            .values()
            .filter(|u| u.product_id == product_id)
            .filter(|u| u.is_allocatable())
            .filter(|u| location_code.map_or(true, |loc| u.location_code == loc))
            .cloned()
            .collect();
        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(units)
    }

    fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<InventoryUnit>> {
        let map = self.lock_units()?;
        let mut units: Vec<InventoryUnit> = map
            .values()
            .filter(|u| u.product_id == product_id)
            .cloned()
            .collect();
        units.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));
        Ok(units)
    }

    fn get_unit(&self, unit_id: &str) -> RepositoryResult<Option<InventoryUnit>> {
        let map = self.lock_units()?;
        Ok(map.get(unit_id).cloned())
    }

    fn try_reserve(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<bool> {
        if quantity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "预留数量必须为正数: {}",
                quantity
            )));
        }

        let mut map = self.lock_units()?;
        let unit = match map.get_mut(unit_id) {
            Some(u) => u,
            None => return Ok(false),
        };

        // 前置条件: AVAILABLE 且余量充足
        if unit.status != UnitStatus::Available || unit.quantity_available < quantity {
            return Ok(false);
        }

        unit.quantity_available -= quantity;
        if unit.quantity_available == 0 {
            unit.status = UnitStatus::Reserved;
        }
        unit.updated_at = Utc::now();
        unit.updated_by = Some(operator.to_string());
        Ok(true)
    }

    fn release(&self, unit_id: &str, quantity: i64, operator: &str) -> RepositoryResult<()> {
        if quantity <= 0 {
            return Err(RepositoryError::ValidationError(format!(
                "释放数量必须为正数: {}",
                quantity
            )));
        }

        let mut map = self.lock_units()?;
        let unit = map.get_mut(unit_id).ok_or_else(|| RepositoryError::NotFound {
            entity: "InventoryUnit".to_string(),
            id: unit_id.to_string(),
        })?;

        unit.quantity_available += quantity;
        if unit.status == UnitStatus::Reserved {
            unit.status = UnitStatus::Available;
        }
        unit.updated_at = Utc::now();
        unit.updated_by = Some(operator.to_string());
        Ok(())
    }

    fn finalize_allocated(&self, unit_ids: &[String], operator: &str) -> RepositoryResult<usize> {
        let mut map = self.lock_units()?;
        let mut count = 0;
        for unit_id in unit_ids {
            if let Some(unit) = map.get_mut(unit_id) {
                // 仅抽干的预留单元定格;部分消耗的单元保持 AVAILABLE 继续供给
                if unit.status == UnitStatus::Reserved && unit.quantity_available == 0 {
                    unit.status = UnitStatus::Allocated;
                    unit.updated_at = Utc::now();
                    unit.updated_by = Some(operator.to_string());
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}

impl AllocationHistory for MemoryInventoryPool {
    fn record(
        &self,
        txn: &AllocationTransaction,
        lines: &[TransactionLine],
    ) -> RepositoryResult<()> {
        let mut history = self
            .history
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        history.push((txn.clone(), lines.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn make_unit(unit_id: &str, quantity: i64) -> InventoryUnit {
        InventoryUnit {
            unit_id: unit_id.to_string(),
            product_id: "P-100".to_string(),
            location_code: "WH-A".to_string(),
            batch_no: None,
            quantity_received: quantity,
            quantity_available: quantity,
            unit_cost: 50.0,
            acquisition_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            warranty_expiry_date: None,
            performance_rating: None,
            failure_count: 0,
            status: UnitStatus::Available,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    #[test]
    fn test_try_reserve_partial_keeps_available() {
        let pool = MemoryInventoryPool::with_units(vec![make_unit("U-001", 5)]);

        let ok = pool.try_reserve("U-001", 3, "tester").unwrap();
        assert!(ok);

        let unit = pool.get_unit("U-001").unwrap().unwrap();
        assert_eq!(unit.quantity_available, 2);
        assert_eq!(unit.status, UnitStatus::Available);
    }

    #[test]
    fn test_try_reserve_drain_flips_reserved() {
        let pool = MemoryInventoryPool::with_units(vec![make_unit("U-001", 5)]);

        let ok = pool.try_reserve("U-001", 5, "tester").unwrap();
        assert!(ok);

        let unit = pool.get_unit("U-001").unwrap().unwrap();
        assert_eq!(unit.quantity_available, 0);
        assert_eq!(unit.status, UnitStatus::Reserved);
    }

    #[test]
    fn test_try_reserve_insufficient_is_precondition_lost() {
        let pool = MemoryInventoryPool::with_units(vec![make_unit("U-001", 2)]);

        let ok = pool.try_reserve("U-001", 3, "tester").unwrap();
        assert!(!ok);

        // 失败不改动余量
        let unit = pool.get_unit("U-001").unwrap().unwrap();
        assert_eq!(unit.quantity_available, 2);
    }

    #[test]
    fn test_release_restores_quantity_and_status() {
        let pool = MemoryInventoryPool::with_units(vec![make_unit("U-001", 4)]);
        pool.try_reserve("U-001", 4, "tester").unwrap();

        pool.release("U-001", 4, "tester").unwrap();

        let unit = pool.get_unit("U-001").unwrap().unwrap();
        assert_eq!(unit.quantity_available, 4);
        assert_eq!(unit.status, UnitStatus::Available);
    }

    #[test]
    fn test_finalize_only_flips_drained_units() {
        let pool =
            MemoryInventoryPool::with_units(vec![make_unit("U-001", 3), make_unit("U-002", 5)]);
        pool.try_reserve("U-001", 3, "tester").unwrap(); // 抽干
        pool.try_reserve("U-002", 2, "tester").unwrap(); // 部分

        let flipped = pool
            .finalize_allocated(&["U-001".to_string(), "U-002".to_string()], "tester")
            .unwrap();
        assert_eq!(flipped, 1);

        assert_eq!(
            pool.get_unit("U-001").unwrap().unwrap().status,
            UnitStatus::Allocated
        );
        assert_eq!(
            pool.get_unit("U-002").unwrap().unwrap().status,
            UnitStatus::Available
        );
    }

    #[test]
    fn test_list_available_filters_and_orders() {
        let mut drained = make_unit("U-003", 2);
        drained.quantity_available = 0;
        drained.status = UnitStatus::Reserved;

        let mut other_loc = make_unit("U-002", 2);
        other_loc.location_code = "WH-B".to_string();

        let pool = MemoryInventoryPool::with_units(vec![
            make_unit("U-004", 1),
            make_unit("U-001", 2),
            other_loc,
            drained,
        ]);

        let all = pool.list_available("P-100", None).unwrap();
        let ids: Vec<&str> = all.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["U-001", "U-002", "U-004"]);

        let at_a = pool.list_available("P-100", Some("WH-A")).unwrap();
        let ids: Vec<&str> = at_a.iter().map(|u| u.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["U-001", "U-004"]);
    }
}
