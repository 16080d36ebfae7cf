// ==========================================
// 生产执行日志 - 完工数据模型
// ==========================================
// CompletionPayload: 操作员提交的原始完工数据 (未校验)
// CompletionData: 校验通过后的规范化完工数据
// ==========================================

use crate::domain::types::ActivityKind;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// SkuCount - SKU 数量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkuCount {
    pub sku_id: i64,
    pub count: i64,
}

impl SkuCount {
    pub fn new(sku_id: i64, count: i64) -> Self {
        Self { sku_id, count }
    }
}

// ==========================================
// CompletionPayload - 完工提交数据
// ==========================================
// 三组输入可同时出现,只有与工序类型匹配的一组会被采用
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionPayload {
    /// 完工日期 (为空时取当天)
    pub completed_on: Option<NaiveDate>,

    // ===== 通用工序 =====
    pub qty_after_process: Option<f64>,
    pub qty_uom: Option<String>,
    /// 操作员已确认在无数量/单位的情况下继续
    #[serde(default)]
    pub proceed_without_qty: bool,

    // ===== 成品质检 =====
    pub lab_ref_number: Option<String>,

    // ===== 包装 / 转库 =====
    #[serde(default)]
    pub sku_lines: Vec<SkuCount>,
}

impl CompletionPayload {
    pub fn quantity(qty: Option<f64>, uom: Option<&str>) -> Self {
        Self {
            qty_after_process: qty,
            qty_uom: uom.map(|s| s.to_string()),
            ..Self::default()
        }
    }

    pub fn lab_ref(lab_ref: &str) -> Self {
        Self {
            lab_ref_number: Some(lab_ref.to_string()),
            ..Self::default()
        }
    }

    pub fn sku_lines(lines: Vec<SkuCount>) -> Self {
        Self {
            sku_lines: lines,
            ..Self::default()
        }
    }

    pub fn with_completed_on(mut self, date: NaiveDate) -> Self {
        self.completed_on = Some(date);
        self
    }

    /// 带上"确认无数量继续"标记
    pub fn confirmed_without_qty(mut self) -> Self {
        self.proceed_without_qty = true;
        self
    }
}

// ==========================================
// ValidatedSkuLine - 校验后的 SKU 行
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedSkuLine {
    pub sku_id: i64,
    pub pack_size: String,
    pub uom: String,
    pub count: i64,
}

impl ValidatedSkuLine {
    /// 展示格式: "{pack_size} {uom} x {count}"
    pub fn display(&self) -> String {
        format!("{} {} x {}", self.pack_size, self.uom, self.count)
    }

    pub fn as_sku_count(&self) -> SkuCount {
        SkuCount::new(self.sku_id, self.count)
    }

    /// 包装规格的数值部分 ("500ml" → 500, "1.5" → 1.5); 无数字前缀时为 None
    pub fn pack_size_value(&self) -> Option<f64> {
        let trimmed = self.pack_size.trim();
        let end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        trimmed[..end].parse::<f64>().ok()
    }
}

/// 拼接 SKU 明细展示串,以 "; " 分隔
pub fn format_sku_breakdown(lines: &[ValidatedSkuLine]) -> String {
    lines
        .iter()
        .map(ValidatedSkuLine::display)
        .collect::<Vec<_>>()
        .join("; ")
}

// ==========================================
// CompletionData - 规范化完工数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionData {
    /// 通用工序; 经确认后允许两者都为空
    Quantity { qty: Option<f64>, uom: Option<String> },
    /// 成品质检
    LabReference { lab_ref: String },
    /// 包装/转库; breakdown 为写回工序日志的唯一形式, lines 另存于包装分配记录
    SkuBreakdown {
        lines: Vec<ValidatedSkuLine>,
        breakdown: String,
    },
}

impl CompletionData {
    pub fn sku_breakdown(lines: Vec<ValidatedSkuLine>) -> Self {
        let breakdown = format_sku_breakdown(&lines);
        CompletionData::SkuBreakdown { lines, breakdown }
    }

    /// 需要写入包装分配记录的 SKU 数量 (非 SKU 类型返回空)
    pub fn sku_counts(&self) -> Vec<SkuCount> {
        match self {
            CompletionData::SkuBreakdown { lines, .. } => {
                lines.iter().map(ValidatedSkuLine::as_sku_count).collect()
            }
            _ => Vec::new(),
        }
    }
}

// ==========================================
// NormalizedPayload - 校验器输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPayload {
    pub kind: ActivityKind,
    pub data: CompletionData,
}
