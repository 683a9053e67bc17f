// ==========================================
// 并发分配控制测试
// ==========================================
// 职责: 多线程/多连接下验证预留协议不超卖、不双分
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod concurrent_allocation_test {
    use inventory_alloc_engine::api::AllocationApi;
    use inventory_alloc_engine::domain::types::{
        BusinessContext, CriteriaKind, SortDirection, UnitStatus,
    };
    use inventory_alloc_engine::domain::{ManualPick, ManualSelection};
    use inventory_alloc_engine::engine::{AllocationError, InventoryPool};
    use inventory_alloc_engine::repository::unit_repo::UnitRepository;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::test_helpers::{
        create_test_db, make_default_strategy, make_request, make_rule, make_unit,
    };

    fn setup_env(product_id: &str, units: &[(&str, i64, f64)]) -> (tempfile::NamedTempFile, String)
    {
        let (temp_file, db_path) = create_test_db().unwrap();

        let api = AllocationApi::open(&db_path).unwrap();
        api.save_strategy(&make_default_strategy(
            "S-COST",
            BusinessContext::Manufacturing,
            vec![make_rule(
                "S-COST",
                CriteriaKind::UnitCost,
                SortDirection::Asc,
                1.0,
                1,
            )],
        ))
        .unwrap();

        let repo = UnitRepository::new(&db_path).unwrap();
        for (unit_id, quantity, cost) in units {
            repo.insert_unit(&make_unit(unit_id, product_id, *quantity, *cost))
                .unwrap();
        }

        (temp_file, db_path)
    }

    /// 守恒校验: 初始总量 == 剩余可用 + 已提交事务分配量
    fn assert_conservation(db_path: &str, product_id: &str, initial_total: i64) {
        let repo = UnitRepository::new(db_path).unwrap();
        let remaining: i64 = repo
            .list_by_product(product_id)
            .unwrap()
            .iter()
            .map(|u| u.quantity_available)
            .sum();

        let api = AllocationApi::open(db_path).unwrap();
        let committed: i64 = api
            .list_recent_transactions(100)
            .unwrap()
            .iter()
            .filter(|t| t.product_id == product_id)
            .map(|t| t.quantity_allocated)
            .sum();

        assert_eq!(
            initial_total,
            remaining + committed,
            "库存守恒被破坏: 初始 {} != 剩余 {} + 已分 {}",
            initial_total,
            remaining,
            committed
        );
    }

    // ==========================================
    // 测试1: 同一单元只允许一个提交者
    // ==========================================

    #[test]
    fn test_single_unit_has_exactly_one_winner() {
        let (_tmp, db_path) = setup_env("P-RACE", &[("U-RACE", 1, 100.0)]);

        let thread_count = 4;
        let barrier = Arc::new(Barrier::new(thread_count));
        let mut handles = Vec::new();

        for i in 0..thread_count {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                // 每个线程独立连接,模拟多调用方
                let api = AllocationApi::open(&db_path).unwrap();
                let request = make_request(&format!("REQ-RACE-{}", i), "P-RACE", 1);
                barrier.wait();
                api.execute(&request, Some(&format!("op-{}", i)))
            }));
        }

        let mut success = 0;
        let mut conflict_or_shortage = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(plan) => {
                    success += 1;
                    assert!(plan.transaction_id.is_some());
                }
                Err(AllocationError::AllocationConflict { .. })
                | Err(AllocationError::InsufficientInventory { .. }) => {
                    conflict_or_shortage += 1;
                }
                Err(other) => panic!("意外错误类型: {:?}", other),
            }
        }

        assert_eq!(success, 1, "同一单元只能有一个提交者赢");
        assert_eq!(conflict_or_shortage, thread_count - 1);

        // 单元被准确抽干一次
        let repo = UnitRepository::new(&db_path).unwrap();
        let unit = repo.find_by_id("U-RACE").unwrap().unwrap();
        assert_eq!(unit.quantity_available, 0);
        assert_eq!(unit.status, UnitStatus::Allocated);

        assert_conservation(&db_path, "P-RACE", 1);

        println!("✅ 单单元竞争测试通过: {} 线程中 1 个成功", thread_count);
    }

    // ==========================================
    // 测试2: 池级竞争不超卖
    // ==========================================

    #[test]
    fn test_pool_contention_never_oversells() {
        // 总量 10,5 个线程各要 3 → 最多 3 个赢家
        let (_tmp, db_path) = setup_env(
            "P-POOL",
            &[("U-P1", 4, 80.0), ("U-P2", 3, 90.0), ("U-P3", 3, 100.0)],
        );

        let thread_count = 5;
        let barrier = Arc::new(Barrier::new(thread_count));
        let mut handles = Vec::new();

        for i in 0..thread_count {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let api = AllocationApi::open(&db_path).unwrap();
                let request = make_request(&format!("REQ-POOL-{}", i), "P-POOL", 3);
                barrier.wait();
                api.execute(&request, Some("op-pool"))
            }));
        }

        let mut success = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => success += 1,
                Err(AllocationError::AllocationConflict { .. })
                | Err(AllocationError::InsufficientInventory { .. }) => {}
                Err(other) => panic!("意外错误类型: {:?}", other),
            }
        }

        assert!(success >= 1, "至少一个请求应当成功");
        assert!(success <= 3, "赢家数 {} 超出库存允许上限 3", success);

        // 任何单元不得出现负库存
        let repo = UnitRepository::new(&db_path).unwrap();
        for unit in repo.list_by_product("P-POOL").unwrap() {
            assert!(
                unit.quantity_available >= 0,
                "单元 {} 出现负库存 {}",
                unit.unit_id,
                unit.quantity_available
            );
        }

        assert_conservation(&db_path, "P-POOL", 10);

        println!("✅ 池级竞争测试通过: {} 个赢家,守恒成立", success);
    }

    // ==========================================
    // 测试3: 人工路径同单元互斥
    // ==========================================

    #[test]
    fn test_concurrent_manual_picks_on_same_unit() {
        let (_tmp, db_path) = setup_env("P-MANUAL", &[("U-SOLO", 1, 200.0)]);

        let barrier = Arc::new(Barrier::new(2));
        let mut handles = Vec::new();

        for i in 0..2 {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let api = AllocationApi::open(&db_path).unwrap();
                let selection = ManualSelection {
                    request_id: format!("REQ-MAN-{}", i),
                    product_id: "P-MANUAL".to_string(),
                    location_code: "WH-01".to_string(),
                    quantity_needed: 1,
                    business_context: BusinessContext::Manufacturing,
                    picks: vec![ManualPick {
                        unit_id: "U-SOLO".to_string(),
                        quantity: 1,
                        reason: None,
                    }],
                    operator: format!("op-{}", i),
                };
                barrier.wait();
                api.execute_manual(&selection)
            }));
        }

        let mut success = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => success += 1,
                // 慢者可能死在预检(单元已不可用)或预留竞争上
                Err(AllocationError::AllocationConflict { .. })
                | Err(AllocationError::InvalidRequest(_)) => {}
                Err(other) => panic!("意外错误类型: {:?}", other),
            }
        }

        assert_eq!(success, 1, "同一单元的人工指定只能有一个成功");

        let api = AllocationApi::open(&db_path).unwrap();
        let txns: Vec<_> = api
            .list_recent_transactions(10)
            .unwrap()
            .into_iter()
            .filter(|t| t.product_id == "P-MANUAL")
            .collect();
        assert_eq!(txns.len(), 1, "只能落一笔事务");

        assert_conservation(&db_path, "P-MANUAL", 1);
    }

    // ==========================================
    // 测试4: 策略路径与人工路径抢同一池
    // ==========================================

    #[test]
    fn test_strategy_and_manual_paths_share_reservation_protocol() {
        let (_tmp, db_path) = setup_env("P-SHARED", &[("U-SH1", 2, 50.0), ("U-SH2", 2, 60.0)]);

        let barrier = Arc::new(Barrier::new(2));

        let strategy_thread = {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let api = AllocationApi::open(&db_path).unwrap();
                let request = make_request("REQ-SH-AUTO", "P-SHARED", 4);
                barrier.wait();
                api.execute(&request, Some("op-auto"))
            })
        };

        let manual_thread = {
            let db_path = db_path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let api = AllocationApi::open(&db_path).unwrap();
                let selection = ManualSelection {
                    request_id: "REQ-SH-MAN".to_string(),
                    product_id: "P-SHARED".to_string(),
                    location_code: "WH-01".to_string(),
                    quantity_needed: 2,
                    business_context: BusinessContext::Manufacturing,
                    picks: vec![ManualPick {
                        unit_id: "U-SH1".to_string(),
                        quantity: 2,
                        reason: Some("指定批次".to_string()),
                    }],
                    operator: "op-man".to_string(),
                };
                barrier.wait();
                api.execute_manual(&selection)
            })
        };

        let strategy_result = strategy_thread.join().unwrap();
        let manual_result = manual_thread.join().unwrap();

        // U-SH1 是双方必争单元,两条路径互斥;失败一方只能是可恢复错误
        if let Err(e) = &strategy_result {
            assert!(matches!(
                e,
                AllocationError::AllocationConflict { .. }
                    | AllocationError::InsufficientInventory { .. }
            ));
        }
        if let Err(e) = &manual_result {
            assert!(matches!(
                e,
                AllocationError::AllocationConflict { .. } | AllocationError::InvalidRequest(_)
            ));
        }
        let winners = [strategy_result.is_ok(), manual_result.is_ok()]
            .iter()
            .filter(|b| **b)
            .count();
        assert!(winners >= 1, "至少一条路径应当成功");

        assert_conservation(&db_path, "P-SHARED", 4);
    }
}
