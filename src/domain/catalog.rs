// ==========================================
// 生产执行日志 - 外部目录只读模型
// ==========================================
// 来源: SKU 目录 / 批次在库 (外部协作方,只读)
// ==========================================

use serde::{Deserialize, Serialize};

/// 物料的有效 SKU (包装规格)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuInfo {
    pub sku_id: i64,
    pub pack_size: String,
    pub uom: String,
}

/// 批次内某 SKU 的在库数量
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnHandStock {
    pub sku_id: i64,
    pub pack_size: String,
    pub uom: String,
    pub qty: i64,
}

/// 物料+批号的成品散装在库 (灌装前)
///
/// `qty_on_hand` 以基本单位计; 包装规格数值 × `conversion_to_base` 换算为基本单位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkStock {
    pub qty_on_hand: f64,
    pub conversion_to_base: f64,
    pub uom_base: Option<String>,
}
