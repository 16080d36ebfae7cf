// ==========================================
// 生产执行日志 - 工序日志领域模型
// ==========================================
// 对齐: scripts/schema.sql daily_work_log 表
// 不变量: completed_on 有值 ⟺ status = Done
// 不变量: Done 时仅与工序类型对应的一组完工字段可有值
// ==========================================

use crate::domain::types::{ActivityKind, CompletionGroup, WorkLogStatus};
use crate::domain::completion::CompletionData;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// LocationRef - 位置层级引用
// ==========================================
// 工段/子工段/区域/设备,均为外部主数据的不透明外键,核心不做层级一致性校验
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRef {
    pub section_id: Option<String>,
    pub subsection_id: Option<String>,
    pub area_id: Option<String>,
    pub plant_id: Option<String>,
}

// ==========================================
// CompletionFields - 完工字段
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionFields {
    pub qty_after_process: Option<f64>, // 加工后数量 (通用工序)
    pub qty_uom: Option<String>,        // 加工后数量单位 (通用工序)
    pub lab_ref_number: Option<String>, // 化验单号 (成品质检)
    pub sku_breakdown: Option<String>,  // SKU 明细展示串 (包装/转库)
}

impl CompletionFields {
    /// 三组全部为空
    pub fn empty() -> Self {
        Self::default()
    }

    /// 按规范化后的完工数据填充,另外两组保持为空
    pub fn from_data(data: &CompletionData) -> Self {
        match data {
            CompletionData::Quantity { qty, uom } => Self {
                qty_after_process: *qty,
                qty_uom: uom.clone(),
                ..Self::default()
            },
            CompletionData::LabReference { lab_ref } => Self {
                lab_ref_number: Some(lab_ref.clone()),
                ..Self::default()
            },
            CompletionData::SkuBreakdown { breakdown, .. } => Self {
                sku_breakdown: Some(breakdown.clone()),
                ..Self::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.qty_after_process.is_none()
            && self.qty_uom.is_none()
            && self.lab_ref_number.is_none()
            && self.sku_breakdown.is_none()
    }

    /// 当前有值的字段分组
    pub fn populated_groups(&self) -> Vec<CompletionGroup> {
        let mut groups = Vec::new();
        if self.qty_after_process.is_some() || self.qty_uom.is_some() {
            groups.push(CompletionGroup::Quantity);
        }
        if self.lab_ref_number.is_some() {
            groups.push(CompletionGroup::LabReference);
        }
        if self.sku_breakdown.is_some() {
            groups.push(CompletionGroup::SkuBreakdown);
        }
        groups
    }
}

// ==========================================
// WorkLogEntry - 工序日志
// ==========================================
// 一条记录对应一次 (日期, 物料, 批号, 工序) 作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLogEntry {
    // ===== 主键 =====
    pub id: String,

    // ===== 作业信息 =====
    pub log_date: NaiveDate,
    #[serde(flatten)]
    pub location: LocationRef,
    pub item: String,
    pub batch_number: String,
    pub batch_size: Option<f64>,
    pub batch_uom: Option<String>,
    pub activity: String,
    pub started_on: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,

    // ===== 状态 =====
    pub status: WorkLogStatus,
    pub completed_on: Option<NaiveDate>,
    #[serde(flatten)]
    pub completion: CompletionFields,

    // ===== 其他 =====
    pub remarks: Option<String>,
    pub uploaded_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl WorkLogEntry {
    /// 是否满足完工不变量
    ///
    /// - completed_on 有值 ⟺ status = Done
    /// - 非 Done: 三组完工字段全部为空
    /// - Done: 只有 `kind` 对应的分组可以有值
    pub fn satisfies_completion_invariant(&self, kind: ActivityKind) -> bool {
        if self.status.is_done() != self.completed_on.is_some() {
            return false;
        }
        let groups = self.completion.populated_groups();
        if !self.status.is_done() {
            return groups.is_empty();
        }
        groups.iter().all(|g| *g == kind.completion_group())
    }

    /// 是否逾期 (未完工且到期日早于今天)
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.status.is_done() && self.due_date.map(|d| d < today).unwrap_or(false)
    }

    /// 提取可编辑的描述信息
    pub fn details(&self) -> WorkLogDetails {
        WorkLogDetails {
            log_date: self.log_date,
            location: self.location.clone(),
            item: self.item.clone(),
            batch_number: self.batch_number.clone(),
            batch_size: self.batch_size,
            batch_uom: self.batch_uom.clone(),
            activity: self.activity.clone(),
            started_on: self.started_on,
            due_date: self.due_date,
            remarks: self.remarks.clone(),
        }
    }
}

// ==========================================
// WorkLogDetails - 描述信息 (不含状态与完工字段)
// ==========================================
// 用途: 录入表单 / 全字段编辑
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLogDetails {
    pub log_date: NaiveDate,
    #[serde(flatten)]
    pub location: LocationRef,
    pub item: String,
    pub batch_number: String,
    pub batch_size: Option<f64>,
    pub batch_uom: Option<String>,
    pub activity: String,
    pub started_on: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub remarks: Option<String>,
}

impl WorkLogDetails {
    /// 最小必填信息构造
    pub fn new(log_date: NaiveDate, item: &str, batch_number: &str, activity: &str) -> Self {
        Self {
            log_date,
            location: LocationRef::default(),
            item: item.to_string(),
            batch_number: batch_number.to_string(),
            batch_size: None,
            batch_uom: None,
            activity: activity.to_string(),
            started_on: None,
            due_date: None,
            remarks: None,
        }
    }
}

// ==========================================
// NewWorkLogEntry - 新建工序日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkLogEntry {
    #[serde(flatten)]
    pub details: WorkLogDetails,
    pub status: WorkLogStatus,
    pub uploaded_by: Option<String>,
}

// ==========================================
// PendingFilter - 未完工列表筛选
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PendingFilter {
    pub log_date: Option<NaiveDate>,
    pub section_id: Option<String>,
    pub subsection_id: Option<String>,
    pub area_id: Option<String>,
    pub item: Option<String>,
    pub batch_number: Option<String>,
    pub overdue_only: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_entry() -> WorkLogEntry {
        let now = Utc::now().naive_utc();
        WorkLogEntry {
            id: "wl1".to_string(),
            log_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            location: LocationRef::default(),
            item: "Amrutharishtam".to_string(),
            batch_number: "B-101".to_string(),
            batch_size: Some(500.0),
            batch_uom: Some("L".to_string()),
            activity: "Drying".to_string(),
            started_on: None,
            due_date: Some(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()),
            status: WorkLogStatus::Doing,
            completed_on: None,
            completion: CompletionFields::empty(),
            remarks: None,
            uploaded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_invariant_for_pending_entry() {
        let entry = sample_entry();
        assert!(entry.satisfies_completion_invariant(ActivityKind::Generic));

        let mut broken = entry.clone();
        broken.completed_on = Some(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        assert!(!broken.satisfies_completion_invariant(ActivityKind::Generic));
    }

    #[test]
    fn test_invariant_rejects_wrong_group() {
        let mut entry = sample_entry();
        entry.status = WorkLogStatus::Done;
        entry.completed_on = Some(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
        entry.completion.lab_ref_number = Some("LAB-1".to_string());

        assert!(entry.satisfies_completion_invariant(ActivityKind::QualityAssessment));
        assert!(!entry.satisfies_completion_invariant(ActivityKind::Generic));
    }

    #[test]
    fn test_overdue() {
        let entry = sample_entry();
        assert!(entry.is_overdue(NaiveDate::from_ymd_opt(2025, 3, 6).unwrap()));
        assert!(!entry.is_overdue(NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()));
    }
}
