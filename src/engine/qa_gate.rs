// ==========================================
// 生产执行日志 - 质检前置检查
// ==========================================
// 规则: 同一物料+批号存在已完工的成品质检记录,才允许进入包装类工序
// 红线: 只读; 状态迁移内部不再重复检查
// ==========================================

use crate::domain::types::ActivityKind;
use crate::engine::activity_classifier::ActivityClassifier;
use crate::repository::error::RepositoryResult;
use crate::repository::WorkLogRepository;
use std::sync::Arc;
use tracing::debug;

pub struct QaPrecedenceGate {
    work_log_repo: Arc<WorkLogRepository>,
}

impl QaPrecedenceGate {
    pub fn new(work_log_repo: Arc<WorkLogRepository>) -> Self {
        Self { work_log_repo }
    }

    /// 该物料+批号是否已有完工的成品质检
    pub fn may_enter_packaging(
        &self,
        classifier: &ActivityClassifier,
        item: &str,
        batch_number: &str,
    ) -> RepositoryResult<bool> {
        let done = self.work_log_repo.find_done_activities(item, batch_number)?;
        let passed = done
            .iter()
            .any(|a| classifier.classify(a) == ActivityKind::QualityAssessment);

        debug!(item = %item, batch_number = %batch_number, passed, "质检前置检查");
        Ok(passed)
    }

    /// 选择工序时的检查: 非包装类工序直接放行
    pub fn allows_activity(
        &self,
        classifier: &ActivityClassifier,
        item: &str,
        batch_number: &str,
        activity: &str,
    ) -> RepositoryResult<bool> {
        if !classifier.is_packaging(activity) {
            return Ok(true);
        }
        self.may_enter_packaging(classifier, item, batch_number)
    }
}
