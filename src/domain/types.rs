// ==========================================
// 生产执行日志 - 领域类型定义
// ==========================================
// 工序状态 / 工序完工类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 工序状态 (Work Log Status)
// ==========================================
// 三个状态之间任意迁移均合法,复杂度全部在进入/离开 Done 的副作用上
// 存储格式: "Doing" / "On Hold" / "Done" (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkLogStatus {
    #[serde(rename = "Doing")]
    Doing, // 进行中
    #[serde(rename = "On Hold")]
    OnHold, // 暂停
    #[serde(rename = "Done")]
    Done, // 已完工
}

impl WorkLogStatus {
    /// 转换为数据库存储字符串
    pub fn as_db_str(&self) -> &'static str {
        match self {
            WorkLogStatus::Doing => "Doing",
            WorkLogStatus::OnHold => "On Hold",
            WorkLogStatus::Done => "Done",
        }
    }

    /// 从数据库字符串解析
    ///
    /// 兼容大小写与 "OnHold"/"On Hold" 两种写法
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "doing" => Some(WorkLogStatus::Doing),
            "on hold" | "onhold" | "on_hold" => Some(WorkLogStatus::OnHold),
            "done" => Some(WorkLogStatus::Done),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, WorkLogStatus::Done)
    }
}

impl fmt::Display for WorkLogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for WorkLogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s).ok_or_else(|| format!("未知工序状态: {}", s))
    }
}

// ==========================================
// 工序完工类型 (Activity Kind)
// ==========================================
// 由 ActivityClassifier 根据工序名派生,决定完工时需要哪一组完工字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    QualityAssessment, // 成品质检 → 化验单号
    PackagingOutput,   // 灌装/小盒包装 → SKU 产出明细
    TransferToStore,   // 转成品库 → SKU 转库明细(受在库数量约束)
    Generic,           // 其他工序 → 加工后数量 + 单位
}

/// 完工字段分组
///
/// WorkLogEntry 上三组完工字段,Done 时只允许其中一组有值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionGroup {
    Quantity,     // qty_after_process + qty_uom
    LabReference, // lab_ref_number
    SkuBreakdown, // sku_breakdown
}

impl ActivityKind {
    /// 是否需要 SKU 明细(并同步到包装分配记录)
    pub fn requires_sku_lines(&self) -> bool {
        matches!(self, ActivityKind::PackagingOutput | ActivityKind::TransferToStore)
    }

    /// 对应的完工字段分组
    pub fn completion_group(&self) -> CompletionGroup {
        match self {
            ActivityKind::QualityAssessment => CompletionGroup::LabReference,
            ActivityKind::PackagingOutput | ActivityKind::TransferToStore => {
                CompletionGroup::SkuBreakdown
            }
            ActivityKind::Generic => CompletionGroup::Quantity,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::QualityAssessment => write!(f, "QUALITY_ASSESSMENT"),
            ActivityKind::PackagingOutput => write!(f, "PACKAGING_OUTPUT"),
            ActivityKind::TransferToStore => write!(f, "TRANSFER_TO_STORE"),
            ActivityKind::Generic => write!(f, "GENERIC"),
        }
    }
}
