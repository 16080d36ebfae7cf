// ==========================================
// 工序状态机集成测试
// ==========================================
// 覆盖: 进入/离开 Done 的完工字段与包装分配同步、失败回滚、计划过期
// ==========================================

mod helpers;

use helpers::mock_config::{InMemoryCatalog, MockConfig};
use mes_worklog::config::ActivityConfigReader;
use mes_worklog::domain::completion::{CompletionPayload, SkuCount};
use mes_worklog::domain::packaging::EventSkuLine;
use mes_worklog::domain::types::{ActivityKind, WorkLogStatus};
use mes_worklog::engine::{
    ActivityClassifier, ConfirmationRequired, PlanSubject, TransitionError, ValidationError,
    WorkLogStateMachine,
};
use mes_worklog::repository::{RepositoryError, WorkLogRepository};
use std::sync::Arc;
use test_helpers::{build_env, build_env_with, count_event_lines, date, sample_entry, BATCH, ITEM};

fn insert_doing(env: &test_helpers::TestEnv, activity: &str) -> String {
    env.work_log_repo
        .insert(&sample_entry(activity, WorkLogStatus::Doing))
        .unwrap()
}

// ==========================================
// 包装工序完工
// ==========================================

#[tokio::test]
async fn test_bottling_done_writes_breakdown_and_allocation() {
    mes_worklog::logging::init_test();
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    assert_eq!(entry.status, WorkLogStatus::Done);
    assert_eq!(entry.completed_on, Some(date(2025, 1, 16)));
    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some("500ml bottle x 10"));
    assert!(entry.completion.qty_after_process.is_none());
    assert!(entry.completion.lab_ref_number.is_none());
    assert!(entry.satisfies_completion_invariant(ActivityKind::PackagingOutput));

    let allocation = env.packaging_store.find_by_work_log(&id).unwrap().unwrap();
    assert_eq!(allocation.event.event_type, "Bottling");
    assert_eq!(allocation.lines, vec![EventSkuLine { sku_id: 1, count: 10 }]);
    assert_eq!(count_event_lines(&env.conn), 1);
}

#[tokio::test]
async fn test_breakdown_follows_catalog_order() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let duplicated = CompletionPayload::sku_lines(vec![
        SkuCount::new(1, 6),
        SkuCount::new(2, 4),
        SkuCount::new(1, 2),
    ]);
    let rejected = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&duplicated), date(2025, 1, 16))
        .await;
    assert!(matches!(
        rejected,
        Err(TransitionError::Validation(ValidationError::DuplicateSku { sku_id: 1 }))
    ));

    // 数量为 0 的行直接丢弃
    let payload = CompletionPayload::sku_lines(vec![
        SkuCount::new(1, 6),
        SkuCount::new(2, 4),
        SkuCount::new(1, 0),
    ]);
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    // 目录按包装规格升序: 200ml 在前
    assert_eq!(
        entry.completion.sku_breakdown.as_deref(),
        Some("200ml bottle x 4; 500ml bottle x 6")
    );
    assert_eq!(count_event_lines(&env.conn), 2);
}

#[tokio::test]
async fn test_done_to_done_replaces_lines() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let first = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    env.state_machine
        .transition(&id, WorkLogStatus::Done, Some(&first), date(2025, 1, 16))
        .await
        .unwrap();

    let second = CompletionPayload::sku_lines(vec![SkuCount::new(2, 3)]);
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&second), date(2025, 1, 17))
        .await
        .unwrap();

    assert_eq!(entry.completed_on, Some(date(2025, 1, 17)));
    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some("200ml bottle x 3"));

    let allocation = env.packaging_store.find_by_work_log(&id).unwrap().unwrap();
    assert_eq!(allocation.lines, vec![EventSkuLine { sku_id: 2, count: 3 }]);
    assert_eq!(env.packaging_store.count_events().unwrap(), 1);
    assert_eq!(count_event_lines(&env.conn), 1);
}

#[tokio::test]
async fn test_empty_breakdown_allowed_by_default() {
    let env = build_env();
    let id = insert_doing(&env, "Monocarton Packing");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 0)]);
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some(""));
    let allocation = env.packaging_store.find_by_work_log(&id).unwrap().unwrap();
    assert!(allocation.lines.is_empty());
}

// ==========================================
// 成品质检 / 通用工序
// ==========================================

#[tokio::test]
async fn test_qa_done_records_lab_ref_without_event() {
    let env = build_env();
    let id = insert_doing(&env, "Finished Goods Quality Assessment");

    let payload = CompletionPayload::lab_ref("  LAB-2024-001 ");
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    assert_eq!(entry.completion.lab_ref_number.as_deref(), Some("LAB-2024-001"));
    assert!(entry.completion.sku_breakdown.is_none());
    assert!(entry.satisfies_completion_invariant(ActivityKind::QualityAssessment));
    assert!(env.packaging_store.find_by_work_log(&id).unwrap().is_none());
}

#[tokio::test]
async fn test_qa_done_without_lab_ref_is_rejected() {
    let env = build_env();
    let id = insert_doing(&env, "Finished Goods Quality Assessment");

    let err = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, None, date(2025, 1, 16))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Validation(ValidationError::MissingLabReference)
    ));

    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(entry.status, WorkLogStatus::Doing);
}

#[tokio::test]
async fn test_generic_without_qty_needs_confirmation() {
    let env = build_env();
    let id = insert_doing(&env, "Drying");

    let err = env
        .state_machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::quantity(None, None)),
            date(2025, 1, 16),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::NeedsConfirmation(ConfirmationRequired::ProceedWithoutQty)
    ));
    let unchanged = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(unchanged.status, WorkLogStatus::Doing);
    assert!(unchanged.completed_on.is_none());

    let confirmed = CompletionPayload::quantity(None, None).confirmed_without_qty();
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&confirmed), date(2025, 1, 16))
        .await
        .unwrap();
    assert_eq!(entry.status, WorkLogStatus::Done);
    assert!(entry.completion.is_empty());
    assert!(entry.satisfies_completion_invariant(ActivityKind::Generic));
}

#[tokio::test]
async fn test_generic_done_keeps_only_quantity_group() {
    let env = build_env();
    let id = insert_doing(&env, "Filtering");

    let mut payload = CompletionPayload::quantity(Some(1150.0), Some("L"));
    payload.lab_ref_number = Some("LAB-X".to_string());
    payload.sku_lines = vec![SkuCount::new(1, 5)];

    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    assert_eq!(entry.completion.qty_after_process, Some(1150.0));
    assert_eq!(entry.completion.qty_uom.as_deref(), Some("L"));
    assert!(entry.completion.lab_ref_number.is_none());
    assert!(entry.completion.sku_breakdown.is_none());
    assert!(env.packaging_store.find_by_work_log(&id).unwrap().is_none());
}

// ==========================================
// 转成品库
// ==========================================

#[tokio::test]
async fn test_transfer_exceeding_on_hand_is_rejected() {
    let env = build_env();
    let id = insert_doing(&env, "Transfer to FG Store");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 30)]);
    let err = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransitionError::Validation(ValidationError::ExceedsOnHand {
            sku_id: 1,
            requested: 30,
            on_hand: 24
        })
    ));
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(entry.status, WorkLogStatus::Doing);
}

#[tokio::test]
async fn test_transfer_within_on_hand_creates_event() {
    let env = build_env();
    let id = insert_doing(&env, "Transfer to FG Store");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 24), SkuCount::new(2, 10)]);
    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    assert_eq!(
        entry.completion.sku_breakdown.as_deref(),
        Some("200ml bottle x 10; 500ml bottle x 24")
    );
    assert!(entry.satisfies_completion_invariant(ActivityKind::TransferToStore));
    let allocation = env.packaging_store.find_by_work_log(&id).unwrap().unwrap();
    assert_eq!(allocation.event.event_type, "Transfer to FG Store");
    assert_eq!(allocation.lines.len(), 2);
}

// ==========================================
// 离开 Done / 非 Done 之间迁移
// ==========================================

#[tokio::test]
async fn test_leaving_done_clears_fields_and_allocation() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    env.state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();

    let entry = env
        .state_machine
        .transition(&id, WorkLogStatus::OnHold, None, date(2025, 1, 17))
        .await
        .unwrap();

    assert_eq!(entry.status, WorkLogStatus::OnHold);
    assert!(entry.completed_on.is_none());
    assert!(entry.completion.is_empty());
    assert!(entry.satisfies_completion_invariant(ActivityKind::PackagingOutput));
    assert!(env.packaging_store.find_by_work_log(&id).unwrap().is_none());
    assert_eq!(count_event_lines(&env.conn), 0);
}

#[tokio::test]
async fn test_doing_and_on_hold_have_no_side_effects() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let held = env
        .state_machine
        .transition(&id, WorkLogStatus::OnHold, None, date(2025, 1, 16))
        .await
        .unwrap();
    assert_eq!(held.status, WorkLogStatus::OnHold);

    let resumed = env
        .state_machine
        .transition(&id, WorkLogStatus::Doing, None, date(2025, 1, 16))
        .await
        .unwrap();
    assert_eq!(resumed.status, WorkLogStatus::Doing);
    assert!(resumed.completion.is_empty());
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
}

#[tokio::test]
async fn test_transition_on_missing_entry() {
    let env = build_env();
    let err = env
        .state_machine
        .transition("missing", WorkLogStatus::OnHold, None, date(2025, 1, 16))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Storage(RepositoryError::NotFound { .. })
    ));
}

// ==========================================
// 失败回滚
// ==========================================

#[tokio::test]
async fn test_failed_line_insert_keeps_previous_state() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    let first = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    env.state_machine
        .transition(&id, WorkLogStatus::Done, Some(&first), date(2025, 1, 16))
        .await
        .unwrap();

    env.conn
        .lock()
        .unwrap()
        .execute_batch(
            r#"
            CREATE TRIGGER reject_sku_2 BEFORE INSERT ON event_skus
            WHEN NEW.sku_id = 2
            BEGIN
                SELECT RAISE(ABORT, 'injected failure');
            END;
            "#,
        )
        .unwrap();

    let second = CompletionPayload::sku_lines(vec![SkuCount::new(2, 4)]);
    let err = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&second), date(2025, 1, 17))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Storage(_)));

    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(entry.completed_on, Some(date(2025, 1, 16)));
    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some("500ml bottle x 10"));
    let allocation = env.packaging_store.find_by_work_log(&id).unwrap().unwrap();
    assert_eq!(allocation.lines, vec![EventSkuLine { sku_id: 1, count: 10 }]);
}

#[tokio::test]
async fn test_failed_status_write_leaves_no_event() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");

    env.conn
        .lock()
        .unwrap()
        .execute_batch(
            r#"
            CREATE TRIGGER reject_done BEFORE UPDATE ON daily_work_log
            WHEN NEW.status = 'Done'
            BEGIN
                SELECT RAISE(ABORT, 'injected failure');
            END;
            "#,
        )
        .unwrap();

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    let err = env
        .state_machine
        .transition(&id, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::Storage(_)));

    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(entry.status, WorkLogStatus::Doing);
    assert!(entry.completion.is_empty());
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
    assert_eq!(count_event_lines(&env.conn), 0);
}

// ==========================================
// 计划过期
// ==========================================

#[tokio::test]
async fn test_stale_plan_is_rejected() {
    let env = build_env();
    let id = insert_doing(&env, "Bottling");
    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 10)]);
    let plan = env
        .state_machine
        .prepare(
            PlanSubject::from(&entry),
            WorkLogStatus::Done,
            Some(&payload),
            date(2025, 1, 16),
        )
        .await
        .unwrap();

    // 计划生成后工序被改为通用工序
    let mut details = entry.details();
    details.activity = "Drying".to_string();
    env.work_log_repo.update_details(&id, &details).unwrap();

    let err = env
        .work_log_repo
        .with_transaction(|tx| WorkLogStateMachine::apply_in(tx, &id, &plan))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::VersionConflict { .. }));

    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(entry.status, WorkLogStatus::Doing);
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
}

#[tokio::test]
async fn test_apply_in_on_deleted_entry() {
    let env = build_env();
    let id = insert_doing(&env, "Drying");
    let entry = env.work_log_repo.find_by_id(&id).unwrap().unwrap();

    let plan = env
        .state_machine
        .prepare(PlanSubject::from(&entry), WorkLogStatus::OnHold, None, date(2025, 1, 16))
        .await
        .unwrap();
    env.work_log_repo
        .with_transaction(|tx| WorkLogRepository::delete_in(tx, &id))
        .unwrap();

    let err = env
        .work_log_repo
        .with_transaction(|tx| WorkLogStateMachine::apply_in(tx, &id, &plan))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
}

// ==========================================
// 自定义配置
// ==========================================

#[tokio::test]
async fn test_custom_packaging_names() {
    let env = build_env_with(|_| {
        Arc::new(MockConfig::with_packaging(&["Capsule Filling"])) as Arc<dyn ActivityConfigReader>
    });
    let filling = insert_doing(&env, "Capsule Filling");
    let bottling = insert_doing(&env, "Bottling");

    let payload = CompletionPayload::sku_lines(vec![SkuCount::new(1, 2)]);
    let entry = env
        .state_machine
        .transition(&filling, WorkLogStatus::Done, Some(&payload), date(2025, 1, 16))
        .await
        .unwrap();
    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some("500ml bottle x 2"));

    // Bottling 不在名单内,按通用工序处理
    let qty = CompletionPayload::quantity(Some(400.0), Some("bottles"));
    let entry = env
        .state_machine
        .transition(&bottling, WorkLogStatus::Done, Some(&qty), date(2025, 1, 16))
        .await
        .unwrap();
    assert_eq!(entry.completion.qty_after_process, Some(400.0));
    assert!(env.packaging_store.find_by_work_log(&bottling).unwrap().is_none());
}

#[tokio::test]
async fn test_strict_empty_breakdown_policy() {
    let env = build_env_with(|_| {
        Arc::new(MockConfig::strict_sku_breakdown()) as Arc<dyn ActivityConfigReader>
    });
    let id = insert_doing(&env, "Bottling");

    let err = env
        .state_machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![])),
            date(2025, 1, 16),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Validation(ValidationError::EmptySkuBreakdown)
    ));
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
}

#[tokio::test]
async fn test_packaging_capped_by_bulk_stock() {
    let env = build_env();
    // B-6 散装在库只剩 2 L
    let mut entry = sample_entry("Bottling", WorkLogStatus::Doing);
    entry.details.batch_number = "B-6".to_string();
    let id = env.work_log_repo.insert(&entry).unwrap();

    let err = env
        .state_machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(1, 5)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap_err();
    match err {
        TransitionError::Validation(ValidationError::ExceedsBulkStock {
            requested,
            available,
            uom_base,
        }) => {
            assert!((requested - 2.5).abs() < 1e-9);
            assert!((available - 2.0).abs() < 1e-9);
            assert_eq!(uom_base.as_deref(), Some("L"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(env.packaging_store.count_events().unwrap(), 0);
    let stored = env.work_log_repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(stored.status, WorkLogStatus::Doing);
    assert!(stored.completion.is_empty());

    let done = env
        .state_machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(1, 4)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap();
    assert_eq!(done.completion.sku_breakdown.as_deref(), Some("500ml bottle x 4"));
    assert_eq!(env.packaging_store.count_events().unwrap(), 1);
}

#[tokio::test]
async fn test_in_memory_catalog_readers() {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.add_sku(ITEM, 7, "100", "ml");
    catalog.set_on_hand(BATCH, 7, "100", "ml", 3);

    let env = build_env();
    let machine = WorkLogStateMachine::new(
        env.work_log_repo.clone(),
        Arc::new(MockConfig::default()),
        catalog.clone(),
        catalog.clone(),
        catalog.clone(),
    );
    let id = insert_doing(&env, "Transfer to FG Store");

    let err = machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(7, 4)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Validation(ValidationError::ExceedsOnHand { sku_id: 7, .. })
    ));

    let entry = machine
        .transition(
            &id,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(7, 3)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap();
    assert_eq!(entry.completion.sku_breakdown.as_deref(), Some("100 ml x 3"));

    // 包装工序按散装在库限量
    catalog.set_bulk(ITEM, BATCH, 250.0);
    let bottling = insert_doing(&env, "Bottling");
    let err = machine
        .transition(
            &bottling,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(7, 3)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TransitionError::Validation(ValidationError::ExceedsBulkStock { .. })
    ));
    machine
        .transition(
            &bottling,
            WorkLogStatus::Done,
            Some(&CompletionPayload::sku_lines(vec![SkuCount::new(7, 2)])),
            date(2025, 1, 16),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_classifier_from_state_machine() {
    let env = build_env();
    let classifier: ActivityClassifier = env.state_machine.classifier().await.unwrap();
    assert_eq!(classifier.classify("bottling"), ActivityKind::PackagingOutput);
    assert_eq!(
        classifier.classify("Finished Goods  Quality Assessment"),
        ActivityKind::QualityAssessment
    );
    assert_eq!(classifier.classify("Drying"), ActivityKind::Generic);
}
