// ==========================================
// 库存分配引擎 - 分配 API
// ==========================================
// 职责: 面向宿主应用的统一门面(预览/执行/人工/查询/配置)
// 依据: ERP_Alloc_Core_Spec.md - 2. 组件表 / 4. 分配流程 / 5. 并发契约
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::config_manager::ConfigManager;
use crate::db;
use crate::domain::allocation::{
    AllocationPlan, AllocationRequest, AllocationTransaction, ManualSelection, TransactionLine,
};
use crate::domain::strategy::{AllocationPreference, AllocationStrategy};
use crate::domain::unit::ImportOutcome;
use crate::engine::error::{AllocationError, AllocationResult};
use crate::engine::pool::InventoryPool;
use crate::engine::{Allocator, ManualAllocator};
use crate::i18n::t_with_args;
use crate::importer::error::ImportResult;
use crate::importer::unit_importer::UnitImporter;
use crate::importer::unit_importer_impl::UnitImporterImpl;
use crate::repository::error::RepositoryError;
use crate::repository::preference_repo::PreferenceRepository;
use crate::repository::registry::StrategyRegistry;
use crate::repository::strategy_repo::StrategyRepository;
use crate::repository::transaction_repo::TransactionRepository;
use crate::repository::unit_repo::UnitRepository;

// ==========================================
// StrategySummary - 策略列表展示
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy_id: String,
    pub strategy_name: String,
    pub kind: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub default_context: Option<String>,
    pub rule_count: usize,
    pub active_rule_count: usize,
}

// ==========================================
// UnitView - 库存单元展示(附衍生字段)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitView {
    pub unit_id: String,
    pub product_id: String,
    pub location_code: String,
    pub batch_no: Option<String>,
    pub quantity_available: i64,
    pub unit_cost: f64,
    pub acquisition_date: String,
    pub warranty_expiry_date: Option<String>,
    pub warranty_days_remaining: i64,
    pub age_days: i64,
    pub performance_rating: Option<String>,
    pub failure_count: i64,
    pub status: String,
}

// ==========================================
// TransactionDetail - 事务详情(头 + 明细行)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub transaction: AllocationTransaction,
    pub lines: Vec<TransactionLine>,
}

// ==========================================
// AllocationApi - 分配门面
// ==========================================

/// 分配 API
///
/// 职责：
/// 1. 分配预览与执行（策略路径 / 人工路径）
/// 2. 策略、库存、事务查询
/// 3. 配置读写与错误文案
pub struct AllocationApi {
    units: Arc<UnitRepository>,
    strategies: Arc<StrategyRepository>,
    preferences: Arc<PreferenceRepository>,
    transactions: Arc<TransactionRepository>,
    registry: Arc<StrategyRegistry>,
    config: Arc<ConfigManager>,
    manual: ManualAllocator,
}

impl AllocationApi {
    /// 打开数据库文件并组装全部依赖（建表幂等）
    pub fn open(db_path: &str) -> AllocationResult<Self> {
        let conn = db::open_sqlite_connection(db_path).map_err(RepositoryError::from)?;
        db::init_schema(&conn).map_err(RepositoryError::from)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接组装（宿主应用/测试注入用）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> AllocationResult<Self> {
        let units = Arc::new(UnitRepository::from_connection(conn.clone()));
        let strategies = Arc::new(StrategyRepository::from_connection(conn.clone()));
        let preferences = Arc::new(PreferenceRepository::from_connection(conn.clone()));
        let transactions = Arc::new(TransactionRepository::from_connection(conn.clone()));
        let config = Arc::new(ConfigManager::from_connection(conn)?);

        let registry = Arc::new(StrategyRegistry::new(
            strategies.clone(),
            preferences.clone(),
        ));
        let manual = ManualAllocator::new(units.clone(), transactions.clone());

        Ok(Self {
            units,
            strategies,
            preferences,
            transactions,
            registry,
            config,
            manual,
        })
    }

    /// 每次调用现读阈值配置,改配置即刻生效,无需重建实例
    fn build_allocator(&self) -> AllocationResult<Allocator> {
        let knobs = self.config.allocator_knobs()?;
        Ok(Allocator::with_knobs(
            self.units.clone(),
            self.transactions.clone(),
            self.registry.clone(),
            knobs,
        ))
    }

    // ==========================================
    // 分配接口
    // ==========================================

    /// 生成分配方案预览（只读，不触碰库存）
    pub fn get_preview(&self, request: &AllocationRequest) -> AllocationResult<AllocationPlan> {
        self.build_allocator()?.preview(request)
    }

    /// 执行分配（重算方案 → 预留 → 留痕）
    ///
    /// # 参数
    /// - operator: 操作人；传 None 时使用配置的 default_operator
    pub fn execute(
        &self,
        request: &AllocationRequest,
        operator: Option<&str>,
    ) -> AllocationResult<AllocationPlan> {
        let operator = match operator {
            Some(op) => op.to_string(),
            None => self.config.get_default_operator()?,
        };
        self.build_allocator()?.execute(request, &operator)
    }

    /// 执行人工指定分配
    pub fn execute_manual(&self, selection: &ManualSelection) -> AllocationResult<AllocationPlan> {
        self.manual.execute(selection)
    }

    // ==========================================
    // 导入接口
    // ==========================================

    /// 从入库文件导入库存单元（.csv/.xlsx/.xls）
    ///
    /// 行级数据问题不中断导入,见返回值中的违规明细
    pub async fn import_units<P: AsRef<std::path::Path> + Send>(
        &self,
        file_path: P,
        operator: &str,
    ) -> ImportResult<ImportOutcome> {
        let importer = UnitImporterImpl::new(self.units.clone());
        importer.import_from_file(file_path, operator).await
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 列出全部策略（含规则统计）
    pub fn list_strategies(&self) -> AllocationResult<Vec<StrategySummary>> {
        let strategies = self.strategies.list_all()?;
        let summaries = strategies
            .iter()
            .map(|s| StrategySummary {
                strategy_id: s.strategy_id.clone(),
                strategy_name: s.strategy_name.clone(),
                kind: s.kind.to_db_str().to_string(),
                description: s.description.clone(),
                is_active: s.is_active,
                is_default: s.is_default,
                default_context: s.default_context.map(|c| c.to_db_str().to_string()),
                rule_count: s.rules.len(),
                active_rule_count: s.rules.iter().filter(|r| r.is_active).count(),
            })
            .collect();
        Ok(summaries)
    }

    /// 查询策略详情
    pub fn get_strategy(&self, strategy_id: &str) -> AllocationResult<Option<AllocationStrategy>> {
        if strategy_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "strategy_id 不能为空".to_string(),
            ));
        }
        Ok(self.strategies.find_by_id(strategy_id)?)
    }

    /// 列出某产品可分配单元（附质保剩余/库龄衍生字段）
    pub fn list_available_units(
        &self,
        product_id: &str,
        location_code: Option<&str>,
    ) -> AllocationResult<Vec<UnitView>> {
        if product_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "product_id 不能为空".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        let units = self.units.list_available(product_id, location_code)?;
        debug!(product_id, count = units.len(), "可分配单元查询");

        let views = units
            .iter()
            .map(|u| UnitView {
                unit_id: u.unit_id.clone(),
                product_id: u.product_id.clone(),
                location_code: u.location_code.clone(),
                batch_no: u.batch_no.clone(),
                quantity_available: u.quantity_available,
                unit_cost: u.unit_cost,
                acquisition_date: u.acquisition_date.to_string(),
                warranty_expiry_date: u.warranty_expiry_date.map(|d| d.to_string()),
                warranty_days_remaining: u.warranty_remaining_days(today),
                age_days: u.age_days(today),
                performance_rating: u.performance_rating.map(|r| r.to_db_str().to_string()),
                failure_count: u.failure_count,
                status: u.status.to_db_str().to_string(),
            })
            .collect();
        Ok(views)
    }

    /// 查询分配事务详情
    pub fn get_transaction(
        &self,
        transaction_id: &str,
    ) -> AllocationResult<Option<TransactionDetail>> {
        if transaction_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "transaction_id 不能为空".to_string(),
            ));
        }

        let detail = self
            .transactions
            .find_by_id(transaction_id)?
            .map(|(transaction, lines)| TransactionDetail { transaction, lines });
        Ok(detail)
    }

    /// 按请求标识查已提交事务
    ///
    /// 调用方执行超时后的重查口径: 查到即提交成功,未查到可安全重试
    pub fn find_transactions_by_request(
        &self,
        request_id: &str,
    ) -> AllocationResult<Vec<AllocationTransaction>> {
        if request_id.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "request_id 不能为空".to_string(),
            ));
        }
        Ok(self.transactions.find_by_request(request_id)?)
    }

    /// 最近提交的事务（倒序）
    pub fn list_recent_transactions(
        &self,
        limit: usize,
    ) -> AllocationResult<Vec<AllocationTransaction>> {
        Ok(self.transactions.list_recent(limit)?)
    }

    // ==========================================
    // 管理接口
    // ==========================================

    /// 新建/覆写策略（含结构校验）
    pub fn save_strategy(&self, strategy: &AllocationStrategy) -> AllocationResult<()> {
        strategy
            .validate()
            .map_err(AllocationError::InvalidRequest)?;
        Ok(self.strategies.upsert_strategy(strategy)?)
    }

    /// 新建/覆写分配偏好
    pub fn save_preference(&self, preference: &AllocationPreference) -> AllocationResult<()> {
        Ok(self.preferences.upsert_preference(preference)?)
    }

    /// 当前生效配置快照（JSON）
    pub fn get_config_snapshot(&self) -> AllocationResult<String> {
        Ok(self.config.get_config_snapshot()?)
    }

    /// 覆写 global 配置项
    pub fn update_config(&self, key: &str, value: &str) -> AllocationResult<()> {
        if key.trim().is_empty() {
            return Err(AllocationError::InvalidRequest(
                "配置键不能为空".to_string(),
            ));
        }
        Ok(self.config.set_global_config_value(key, value)?)
    }

    // ==========================================
    // 错误文案
    // ==========================================

    /// 面向界面的错误描述（缺口类错误走本地化文案）
    pub fn describe_error(err: &AllocationError) -> String {
        match err {
            AllocationError::InsufficientInventory {
                requested,
                available,
                shortfall,
            } => t_with_args(
                "allocation.recommend.shortfall",
                &[
                    ("requested", &requested.to_string()),
                    ("available", &available.to_string()),
                    ("shortfall", &shortfall.to_string()),
                ],
            ),
            other => other.to_string(),
        }
    }
}
