// ==========================================
// 生产执行日志 - 外部目录读取 Trait
// ==========================================
// 职责: SKU 目录 / 批次在库 / 散装在库的只读接口
// 实现者: SqliteCatalogRepository (产品主数据表); 测试中为内存实现
// ==========================================

use crate::domain::catalog::{BulkStock, OnHandStock, SkuInfo};
use async_trait::async_trait;
use std::error::Error;

pub type CatalogResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 物料的有效 SKU 列表
#[async_trait]
pub trait SkuCatalogReader: Send + Sync {
    async fn list_active_skus(&self, item: &str) -> CatalogResult<Vec<SkuInfo>>;
}

/// 批次在库数量
#[async_trait]
pub trait BatchStockReader: Send + Sync {
    async fn on_hand(&self, batch_number: &str) -> CatalogResult<Vec<OnHandStock>>;
}

/// 成品散装在库
///
/// 无在库记录时 qty_on_hand 为 0; 物料未设置换算系数时按 1 处理
#[async_trait]
pub trait BulkStockReader: Send + Sync {
    async fn bulk_stock(&self, item: &str, batch_number: &str) -> CatalogResult<BulkStock>;
}
