// ==========================================
// 生产执行日志 - 工序日志 API
// ==========================================
// 职责: 录入 / 状态编辑 / 全字段编辑 / 删除 / 未完工列表
// 红线: 状态迁移一律经由 WorkLogStateMachine; 质检前置检查在迁移之前
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::completion::CompletionPayload;
use crate::domain::packaging::PackagingAllocation;
use crate::domain::types::WorkLogStatus;
use crate::domain::work_log::{NewWorkLogEntry, PendingFilter, WorkLogDetails, WorkLogEntry};
use crate::engine::activity_classifier::ActivityClassifier;
use crate::engine::due_date::derive_due_date;
use crate::engine::ordering::sort_pending;
use crate::engine::qa_gate::QaPrecedenceGate;
use crate::engine::state_machine::{PlanSubject, WorkLogStateMachine};
use crate::i18n::t_with_args;
use crate::repository::error::RepositoryError;
use crate::repository::{PackagingAllocationStore, SqliteCatalogRepository, WorkLogRepository};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

// ==========================================
// WorkLogApi
// ==========================================
pub struct WorkLogApi {
    work_log_repo: Arc<WorkLogRepository>,
    packaging_store: Arc<PackagingAllocationStore>,
    catalog_repo: Arc<SqliteCatalogRepository>,
    state_machine: Arc<WorkLogStateMachine>,
    qa_gate: QaPrecedenceGate,
}

impl WorkLogApi {
    pub fn new(
        work_log_repo: Arc<WorkLogRepository>,
        packaging_store: Arc<PackagingAllocationStore>,
        catalog_repo: Arc<SqliteCatalogRepository>,
        state_machine: Arc<WorkLogStateMachine>,
    ) -> Self {
        Self {
            qa_gate: QaPrecedenceGate::new(work_log_repo.clone()),
            work_log_repo,
            packaging_store,
            catalog_repo,
            state_machine,
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    // ==========================================
    // 录入
    // ==========================================

    /// 新建工序日志
    ///
    /// # 参数
    /// - `entry`: 录入表单
    /// - `payload`: 以 Done 状态录入时的完工数据
    ///
    /// # 说明
    /// - 包装类工序需先通过质检前置检查
    /// - 未填写到期日时按工序标准工期推算 (跳过周日)
    /// - 以 Done 录入时,插入与完工写入在同一事务内
    pub async fn create_entry(
        &self,
        mut entry: NewWorkLogEntry,
        payload: Option<CompletionPayload>,
    ) -> ApiResult<WorkLogEntry> {
        normalize_details(&mut entry.details)?;
        let details = &entry.details;

        let classifier = self.state_machine.classifier().await?;
        self.ensure_qa_gate(&classifier, &details.item, &details.batch_number, &details.activity)?;

        if entry.details.due_date.is_none() {
            let duration = self.catalog_repo.find_duration_days(&entry.details.activity)?;
            entry.details.due_date = derive_due_date(entry.details.started_on, duration);
        }

        let today = Self::today();
        let created = if entry.status.is_done() {
            let payload = payload.map(|p| clamp_completed_on(p, today));
            let plan = self
                .state_machine
                .prepare(
                    PlanSubject::from(&entry.details),
                    WorkLogStatus::Done,
                    payload.as_ref(),
                    today,
                )
                .await?;

            self.work_log_repo
                .with_transaction(|tx| {
                    let id = WorkLogRepository::insert_in(tx, &entry)?;
                    WorkLogStateMachine::apply_in(tx, &id, &plan)
                })
                .map_err(|e| duplicate_or(e, &entry.details))?
        } else {
            let id = self
                .work_log_repo
                .insert(&entry)
                .map_err(|e| duplicate_or(e, &entry.details))?;
            self.load_entry(&id)?
        };

        info!(
            work_log_id = %created.id,
            item = %created.item,
            batch_number = %created.batch_number,
            activity = %created.activity,
            status = %created.status,
            "工序日志已创建"
        );
        Ok(created)
    }

    /// 选择工序时的质检前置检查
    pub async fn check_activity_selection(
        &self,
        item: &str,
        batch_number: &str,
        activity: &str,
    ) -> ApiResult<()> {
        let classifier = self.state_machine.classifier().await?;
        self.ensure_qa_gate(&classifier, item, batch_number, activity)
    }

    // ==========================================
    // 状态编辑
    // ==========================================

    /// 更新工序状态
    ///
    /// 完工日期晚于今天时按今天记录
    pub async fn update_status(
        &self,
        work_log_id: &str,
        target: WorkLogStatus,
        payload: Option<CompletionPayload>,
    ) -> ApiResult<WorkLogEntry> {
        let today = Self::today();
        let payload = payload.map(|p| clamp_completed_on(p, today));

        let updated = self
            .state_machine
            .transition(work_log_id, target, payload.as_ref(), today)
            .await?;
        Ok(updated)
    }

    // ==========================================
    // 全字段编辑
    // ==========================================

    /// 编辑描述信息 (不改变状态与完工字段)
    ///
    /// - Done 记录不允许修改物料、批号、工序
    /// - 改为包装类工序 (或包装类工序改批次) 时重新做质检前置检查
    pub async fn update_details(
        &self,
        work_log_id: &str,
        mut details: WorkLogDetails,
    ) -> ApiResult<WorkLogEntry> {
        normalize_details(&mut details)?;
        let current = self.load_entry(work_log_id)?;

        let subject = PlanSubject::from(&details);
        let identity_changed = !PlanSubject::from(&current).same_identity(&subject);
        if identity_changed {
            let classifier = self.state_machine.classifier().await?;
            self.ensure_qa_gate(&classifier, &details.item, &details.batch_number, &details.activity)?;
        }

        let updated = self
            .work_log_repo
            .with_transaction(|tx| {
                let locked = WorkLogRepository::find_by_id_in(tx, work_log_id)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "WorkLogEntry".to_string(),
                        id: work_log_id.to_string(),
                    }
                })?;
                if locked.status.is_done() && !PlanSubject::from(&locked).same_identity(&subject) {
                    return Err(RepositoryError::IdentityLocked {
                        id: work_log_id.to_string(),
                    });
                }
                WorkLogRepository::update_details_in(tx, work_log_id, &details)?;
                WorkLogRepository::find_by_id_in(tx, work_log_id)?.ok_or_else(|| {
                    RepositoryError::NotFound {
                        entity: "WorkLogEntry".to_string(),
                        id: work_log_id.to_string(),
                    }
                })
            })
            .map_err(|e| match e {
                locked @ RepositoryError::IdentityLocked { .. } => {
                    warn!(work_log_id = %work_log_id, "已完工记录拒绝修改身份字段");
                    ApiError::from(locked)
                }
                other => duplicate_or(other, &details),
            })?;

        info!(work_log_id = %work_log_id, activity = %updated.activity, "工序日志已编辑");
        Ok(updated)
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除工序日志 (连同包装分配,同一事务)
    pub fn delete_entry(&self, work_log_id: &str) -> ApiResult<()> {
        let removed = self.work_log_repo.with_transaction(|tx| {
            PackagingAllocationStore::clear_in(tx, work_log_id)?;
            WorkLogRepository::delete_in(tx, work_log_id)
        })?;

        if removed == 0 {
            return Err(ApiError::NotFound(format!(
                "WorkLogEntry(id={})不存在",
                work_log_id
            )));
        }

        info!(work_log_id = %work_log_id, "工序日志已删除");
        Ok(())
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_entry(&self, work_log_id: &str) -> ApiResult<WorkLogEntry> {
        self.load_entry(work_log_id)
    }

    /// 查询工序日志的包装分配 (无则 None)
    pub fn get_packaging(&self, work_log_id: &str) -> ApiResult<Option<PackagingAllocation>> {
        Ok(self.packaging_store.find_by_work_log(work_log_id)?)
    }

    /// 未完工列表 (Doing / On Hold)
    ///
    /// 排序: 日志日期 → 物料 → 批号 (自然序) → 设备
    pub fn list_pending(&self, filter: &PendingFilter) -> ApiResult<Vec<WorkLogEntry>> {
        let mut entries = self.work_log_repo.find_pending(filter, Self::today())?;
        sort_pending(&mut entries);
        Ok(entries)
    }

    /// "完工并新增"模板: 沿用物料与批号,其余待填写
    pub fn carry_forward(entry: &WorkLogEntry, today: NaiveDate) -> NewWorkLogEntry {
        let mut details = WorkLogDetails::new(today, &entry.item, &entry.batch_number, "");
        details.batch_size = entry.batch_size;
        details.batch_uom = entry.batch_uom.clone();
        NewWorkLogEntry {
            details,
            status: WorkLogStatus::Doing,
            uploaded_by: entry.uploaded_by.clone(),
        }
    }

    // ==========================================
    // 内部
    // ==========================================

    fn load_entry(&self, work_log_id: &str) -> ApiResult<WorkLogEntry> {
        self.work_log_repo
            .find_by_id(work_log_id)?
            .ok_or_else(|| ApiError::NotFound(format!("WorkLogEntry(id={})不存在", work_log_id)))
    }

    fn ensure_qa_gate(
        &self,
        classifier: &ActivityClassifier,
        item: &str,
        batch_number: &str,
        activity: &str,
    ) -> ApiResult<()> {
        if self
            .qa_gate
            .allows_activity(classifier, item, batch_number, activity)?
        {
            return Ok(());
        }
        warn!(
            item = %item,
            batch_number = %batch_number,
            activity = %activity,
            "质检未完工, 拒绝进入包装工序"
        );
        Err(ApiError::qa_not_done(item, batch_number))
    }
}

/// 必填字段去空白并检查
fn normalize_details(details: &mut WorkLogDetails) -> ApiResult<()> {
    for (field, value) in [
        ("item", &mut details.item),
        ("batch_number", &mut details.batch_number),
        ("activity", &mut details.activity),
    ] {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            return Err(ApiError::InvalidInput(t_with_args(
                "worklog.missing_field",
                &[("field", field)],
            )));
        }
        *value = trimmed;
    }
    Ok(())
}

fn clamp_completed_on(mut payload: CompletionPayload, today: NaiveDate) -> CompletionPayload {
    if let Some(date) = payload.completed_on {
        if date > today {
            payload.completed_on = Some(today);
        }
    }
    payload
}

fn duplicate_or(err: RepositoryError, details: &WorkLogDetails) -> ApiError {
    match err {
        RepositoryError::UniqueConstraintViolation(_) => ApiError::DuplicateEntry(t_with_args(
            "worklog.duplicate_entry",
            &[
                ("item", details.item.as_str()),
                ("batch", details.batch_number.as_str()),
                ("activity", details.activity.as_str()),
            ],
        )),
        other => ApiError::from(other),
    }
}
