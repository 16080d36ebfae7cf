// ==========================================
// 生产执行日志 - 包装分配领域模型
// ==========================================
// 对齐: packaging_events / event_skus 表
// 不变量: 每条工序日志至多一个 PackagingEvent
// 不变量: EventSkuLine 集合 = 最近一次提交的非零 SKU 行 (整体替换,不合并)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// PackagingEvent - 包装事件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingEvent {
    pub id: String,
    pub work_log_id: String, // 唯一
    pub event_type: String,  // 完工时的工序名
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// EventSkuLine - 包装事件 SKU 明细
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventSkuLine {
    pub sku_id: i64,
    pub count: i64, // 正整数
}

// ==========================================
// PackagingAllocation - 事件 + 明细 (读取视图)
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackagingAllocation {
    pub event: PackagingEvent,
    pub lines: Vec<EventSkuLine>,
}
