// ==========================================
// 生产执行日志 - 工序状态机
// ==========================================
// 状态: Doing / On Hold / Done,任意迁移均合法
// 进入 Done: 分类 → 校验 → 写入对应完工字段 (+ 包装分配)
// 离开 Done 或 Done → Done: 先清除包装分配,再清空完工字段
// ==========================================
// 两阶段:
// - prepare: 分类/校验/读目录,产出 TransitionPlan (不写库)
// - apply_in: 在 IMMEDIATE 事务内重读行、核对计划、写库
// ==========================================

use crate::config::ActivityConfigReader;
use crate::domain::completion::{CompletionPayload, NormalizedPayload};
use crate::domain::types::WorkLogStatus;
use crate::domain::work_log::{CompletionFields, WorkLogDetails, WorkLogEntry};
use crate::engine::activity_classifier::{normalize_activity_name, ActivityClassifier};
use crate::engine::catalog_reader::{BatchStockReader, BulkStockReader, SkuCatalogReader};
use crate::engine::payload_validator::{
    CompletionPayloadValidator, ConfirmationRequired, PayloadRejection, ValidationContext,
    ValidationError,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{PackagingAllocationStore, WorkLogRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

// ==========================================
// TransitionError - 状态迁移错误
// ==========================================
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("完工数据校验失败: {0}")]
    Validation(#[from] ValidationError),

    #[error("需要确认: {0:?}")]
    NeedsConfirmation(ConfirmationRequired),

    #[error("存储失败: {0}")]
    Storage(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("目录读取失败: {0}")]
    Lookup(String),
}

impl From<PayloadRejection> for TransitionError {
    fn from(rejection: PayloadRejection) -> Self {
        match rejection {
            PayloadRejection::NeedsConfirmation(c) => TransitionError::NeedsConfirmation(c),
            PayloadRejection::Invalid(e) => TransitionError::Validation(e),
            PayloadRejection::LookupFailed(msg) => TransitionError::Lookup(msg),
        }
    }
}

pub type TransitionResult<T> = Result<T, TransitionError>;

// ==========================================
// PlanSubject - 计划针对的工序日志身份
// ==========================================
// apply_in 会用它与事务内重读的行比对
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSubject {
    pub item: String,
    pub batch_number: String,
    pub activity: String,
}

impl PlanSubject {
    /// 物料、批号逐字比较; 工序名按归一化结果比较 (大小写与空白不算改动)
    pub fn same_identity(&self, other: &PlanSubject) -> bool {
        self.item == other.item
            && self.batch_number == other.batch_number
            && normalize_activity_name(&self.activity) == normalize_activity_name(&other.activity)
    }
}

impl From<&WorkLogEntry> for PlanSubject {
    fn from(entry: &WorkLogEntry) -> Self {
        Self {
            item: entry.item.clone(),
            batch_number: entry.batch_number.clone(),
            activity: entry.activity.clone(),
        }
    }
}

impl From<&WorkLogDetails> for PlanSubject {
    fn from(details: &WorkLogDetails) -> Self {
        Self {
            item: details.item.clone(),
            batch_number: details.batch_number.clone(),
            activity: details.activity.clone(),
        }
    }
}

// ==========================================
// TransitionPlan - 已校验的迁移计划
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    pub subject: PlanSubject,
    pub target: WorkLogStatus,
    /// 仅 target = Done 时有值
    pub completion: Option<PlannedCompletion>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCompletion {
    pub completed_on: NaiveDate,
    pub payload: NormalizedPayload,
}

// ==========================================
// WorkLogStateMachine
// ==========================================
pub struct WorkLogStateMachine {
    work_log_repo: Arc<WorkLogRepository>,
    config: Arc<dyn ActivityConfigReader>,
    catalog: Arc<dyn SkuCatalogReader>,
    stock: Arc<dyn BatchStockReader>,
    bulk: Arc<dyn BulkStockReader>,
}

impl WorkLogStateMachine {
    pub fn new(
        work_log_repo: Arc<WorkLogRepository>,
        config: Arc<dyn ActivityConfigReader>,
        catalog: Arc<dyn SkuCatalogReader>,
        stock: Arc<dyn BatchStockReader>,
        bulk: Arc<dyn BulkStockReader>,
    ) -> Self {
        Self {
            work_log_repo,
            config,
            catalog,
            stock,
            bulk,
        }
    }

    /// 加载当前配置下的工序分类器
    pub async fn classifier(&self) -> TransitionResult<ActivityClassifier> {
        ActivityClassifier::load(self.config.as_ref())
            .await
            .map_err(|e| TransitionError::Config(e.to_string()))
    }

    /// 生成迁移计划 (只读)
    ///
    /// # 参数
    /// - `subject`: 工序日志的物料/批号/工序
    /// - `target`: 目标状态
    /// - `payload`: 完工数据,仅 target = Done 时使用
    /// - `today`: 未填写完工日期时的缺省值
    pub async fn prepare(
        &self,
        subject: PlanSubject,
        target: WorkLogStatus,
        payload: Option<&CompletionPayload>,
        today: NaiveDate,
    ) -> TransitionResult<TransitionPlan> {
        if !target.is_done() {
            return Ok(TransitionPlan {
                subject,
                target,
                completion: None,
            });
        }

        let classifier = self.classifier().await?;
        let kind = classifier.classify(&subject.activity);
        let allow_empty_sku_breakdown = self
            .config
            .get_allow_empty_sku_breakdown()
            .await
            .map_err(|e| TransitionError::Config(e.to_string()))?;

        let empty = CompletionPayload::default();
        let payload = payload.unwrap_or(&empty);

        let ctx = ValidationContext {
            item: &subject.item,
            batch_number: &subject.batch_number,
            catalog: self.catalog.as_ref(),
            stock: self.stock.as_ref(),
            bulk: self.bulk.as_ref(),
            allow_empty_sku_breakdown,
        };
        let normalized = CompletionPayloadValidator::validate(kind, payload, &ctx).await?;

        debug!(
            activity = %subject.activity,
            kind = %kind,
            "完工数据校验通过"
        );

        Ok(TransitionPlan {
            completion: Some(PlannedCompletion {
                completed_on: payload.completed_on.unwrap_or(today),
                payload: normalized,
            }),
            subject,
            target,
        })
    }

    /// 在调用方事务内执行迁移计划
    ///
    /// # 返回
    /// - `Ok(entry)`: 写入后的工序日志
    /// - `Err(NotFound)`: 行已不存在
    /// - `Err(VersionConflict)`: 行的物料/批号/工序已与计划不符
    pub fn apply_in(
        conn: &Connection,
        work_log_id: &str,
        plan: &TransitionPlan,
    ) -> RepositoryResult<WorkLogEntry> {
        let current = WorkLogRepository::find_by_id_in(conn, work_log_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkLogEntry".to_string(),
                id: work_log_id.to_string(),
            }
        })?;

        if PlanSubject::from(&current) != plan.subject {
            return Err(RepositoryError::VersionConflict {
                message: format!(
                    "工序日志 {} 已被修改 (计划: {}/{}/{})",
                    work_log_id, plan.subject.item, plan.subject.batch_number, plan.subject.activity
                ),
            });
        }

        if current.status.is_done() || plan.target.is_done() {
            PackagingAllocationStore::clear_in(conn, work_log_id)?;
        }

        if plan.target.is_done() {
            let completion = plan.completion.as_ref().ok_or_else(|| {
                RepositoryError::InternalError("完工计划缺少完工数据".to_string())
            })?;
            let payload = &completion.payload;
            if payload.kind.requires_sku_lines() {
                PackagingAllocationStore::upsert_in(
                    conn,
                    work_log_id,
                    &current.activity,
                    &payload.data.sku_counts(),
                )?;
            }
            WorkLogRepository::update_status_in(
                conn,
                work_log_id,
                WorkLogStatus::Done,
                Some(completion.completed_on),
                &CompletionFields::from_data(&payload.data),
            )?;
        } else {
            WorkLogRepository::update_status_in(
                conn,
                work_log_id,
                plan.target,
                None,
                &CompletionFields::empty(),
            )?;
        }

        WorkLogRepository::find_by_id_in(conn, work_log_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkLogEntry".to_string(),
                id: work_log_id.to_string(),
            }
        })
    }

    /// 完整迁移: 读取 → prepare → 单事务 apply
    pub async fn transition(
        &self,
        work_log_id: &str,
        target: WorkLogStatus,
        payload: Option<&CompletionPayload>,
        today: NaiveDate,
    ) -> TransitionResult<WorkLogEntry> {
        let entry = self.work_log_repo.find_by_id(work_log_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "WorkLogEntry".to_string(),
                id: work_log_id.to_string(),
            }
        })?;
        let from = entry.status;

        let plan = match self
            .prepare(PlanSubject::from(&entry), target, payload, today)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                warn!(
                    work_log_id = %work_log_id,
                    activity = %entry.activity,
                    target = %target,
                    error = %e,
                    "状态迁移被拒绝"
                );
                return Err(e);
            }
        };

        let updated = self
            .work_log_repo
            .with_transaction(|tx| Self::apply_in(tx, work_log_id, &plan))
            .map_err(|e| {
                warn!(work_log_id = %work_log_id, error = %e, "状态迁移写入失败, 已回滚");
                TransitionError::Storage(e)
            })?;

        info!(
            work_log_id = %work_log_id,
            activity = %updated.activity,
            from = %from,
            to = %updated.status,
            "状态迁移完成"
        );
        Ok(updated)
    }
}
