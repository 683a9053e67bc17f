// ==========================================
// 配置层集成测试
// ==========================================
// 职责: API 层配置覆写即刻生效(阈值/默认操作员/快照留痕)
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod config_test {
    use std::collections::HashMap;

    use chrono::{Duration, Utc};
    use inventory_alloc_engine::api::AllocationApi;
    use inventory_alloc_engine::domain::types::{BusinessContext, CriteriaKind, SortDirection};
    use inventory_alloc_engine::engine::AllocationError;
    use inventory_alloc_engine::repository::unit_repo::UnitRepository;

    use crate::test_helpers::{
        create_test_db, make_default_strategy, make_request, make_rule, make_unit,
    };

    fn seed_cost_strategy(api: &AllocationApi) {
        api.save_strategy(&make_default_strategy(
            "S-COST",
            BusinessContext::Manufacturing,
            vec![make_rule("S-COST", CriteriaKind::UnitCost, SortDirection::Asc, 1.0, 1)],
        ))
        .unwrap();
    }

    // ==========================================
    // 测试1: 配置快照随覆写变化
    // ==========================================

    #[test]
    fn test_config_snapshot_reflects_updates() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();

        assert_eq!(api.get_config_snapshot().unwrap(), "{}");

        api.update_config("warranty_warning_days", "30").unwrap();
        api.update_config("default_operator", "op-cfg").unwrap();

        let snapshot = api.get_config_snapshot().unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(parsed.get("warranty_warning_days"), Some(&"30".to_string()));
        assert_eq!(parsed.get("default_operator"), Some(&"op-cfg".to_string()));

        // UPSERT 覆写
        api.update_config("warranty_warning_days", "45").unwrap();
        let parsed: HashMap<String, String> =
            serde_json::from_str(&api.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(parsed.get("warranty_warning_days"), Some(&"45".to_string()));
    }

    #[test]
    fn test_update_config_rejects_blank_key() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();

        let err = api.update_config("", "10").unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
        let err = api.update_config("   ", "10").unwrap_err();
        assert!(matches!(err, AllocationError::InvalidRequest(_)));
    }

    // ==========================================
    // 测试2: 阈值覆写对下一次预览即刻生效
    // ==========================================

    #[test]
    fn test_warranty_knob_takes_effect_without_reopen() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();
        seed_cost_strategy(&api);

        // 单一单元,质保剩 40 天;池均值=方案均值,不会触发成本建议
        let mut unit = make_unit("U-WARR", "P-CFG", 5, 100.0);
        unit.warranty_expiry_date = Some(Utc::now().date_naive() + Duration::days(40));
        UnitRepository::new(&db_path).unwrap().insert_unit(&unit).unwrap();

        let request = make_request("REQ-CFG-1", "P-CFG", 2);

        // 默认阈值 90: 40 < 90 触发提示
        let plan = api.get_preview(&request).unwrap();
        assert!(plan.recommendations.iter().any(|r| r.contains("U-WARR")));

        // 调到 10: 40 天不再算"即将过保",同一实例无需重开
        api.update_config("warranty_warning_days", "10").unwrap();
        let plan = api.get_preview(&request).unwrap();
        assert!(plan.recommendations.is_empty());

        // 调到 400: 重新触发
        api.update_config("warranty_warning_days", "400").unwrap();
        let plan = api.get_preview(&request).unwrap();
        assert!(plan.recommendations.iter().any(|r| r.contains("U-WARR")));

        println!("✅ 阈值覆写即刻生效验证通过");
    }

    #[test]
    fn test_cost_and_failure_knobs_steer_recommendations() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();

        // 反向成本策略,专挑贵的,制造"方案均价高于池均值"
        api.save_strategy(&make_default_strategy(
            "S-DEAR",
            BusinessContext::Manufacturing,
            vec![make_rule("S-DEAR", CriteriaKind::UnitCost, SortDirection::Desc, 1.0, 1)],
        ))
        .unwrap();

        let repo = UnitRepository::new(&db_path).unwrap();
        repo.insert_unit(&make_unit("U-CHEAP", "P-CFG2", 5, 50.0)).unwrap();
        let mut dear = make_unit("U-DEAR", "P-CFG2", 5, 100.0);
        dear.failure_count = 2;
        repo.insert_unit(&dear).unwrap();

        let request = make_request("REQ-CFG-2", "P-CFG2", 5);

        // 默认口径: 方案均价 100 高出池均值 75 约 33%,超 15% 触发;故障 2 < 3 不触发
        let plan = api.get_preview(&request).unwrap();
        assert_eq!(plan.lines[0].unit_id, "U-DEAR");
        assert_eq!(plan.recommendations.len(), 1);
        assert!(!plan.recommendations[0].contains("U-DEAR"), "默认口径应只有成本建议");

        // 放宽成本口径到 50%,收紧故障口径到 2 次
        api.update_config("cost_over_avg_warn_pct", "50").unwrap();
        api.update_config("failure_count_warn", "2").unwrap();

        let plan = api.get_preview(&request).unwrap();
        assert_eq!(plan.recommendations.len(), 1);
        assert!(plan.recommendations[0].contains("U-DEAR"), "收紧后应只剩故障建议");
    }

    // ==========================================
    // 测试3: 默认操作员与快照留痕
    // ==========================================

    #[test]
    fn test_default_operator_applied_when_caller_omits() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();
        seed_cost_strategy(&api);
        UnitRepository::new(&db_path)
            .unwrap()
            .insert_unit(&make_unit("U-OP", "P-CFG3", 10, 80.0))
            .unwrap();

        let plan = api
            .execute(&make_request("REQ-CFG-3A", "P-CFG3", 2), None)
            .unwrap();
        let detail = api
            .get_transaction(&plan.transaction_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(detail.transaction.operator, "system");

        api.update_config("default_operator", "op-night-shift").unwrap();
        let plan = api
            .execute(&make_request("REQ-CFG-3B", "P-CFG3", 2), None)
            .unwrap();
        let detail = api
            .get_transaction(&plan.transaction_id.unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(detail.transaction.operator, "op-night-shift");
    }

    #[test]
    fn test_execution_snapshots_effective_knobs() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let api = AllocationApi::open(&db_path).unwrap();
        seed_cost_strategy(&api);
        UnitRepository::new(&db_path)
            .unwrap()
            .insert_unit(&make_unit("U-SNAP", "P-CFG4", 10, 80.0))
            .unwrap();

        api.update_config("warranty_warning_days", "42").unwrap();

        let plan = api
            .execute(&make_request("REQ-CFG-4", "P-CFG4", 1), Some("op-snap"))
            .unwrap();
        let detail = api
            .get_transaction(&plan.transaction_id.unwrap())
            .unwrap()
            .unwrap();

        let snapshot = detail
            .transaction
            .config_snapshot_json
            .expect("策略路径执行应留配置快照");
        let knobs: serde_json::Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(knobs["warranty_warning_days"], 42);
        assert_eq!(knobs["failure_count_warn"], 3);
    }
}
