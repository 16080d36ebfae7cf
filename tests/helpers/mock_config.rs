// ==========================================
// Mock 配置与目录实现 - 用于集成测试
// ==========================================

use async_trait::async_trait;
use mes_worklog::config::{config_defaults, ActivityConfigReader, ConfigResult};
use mes_worklog::domain::catalog::{BulkStock, OnHandStock, SkuInfo};
use mes_worklog::engine::{BatchStockReader, BulkStockReader, CatalogResult, SkuCatalogReader};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mock 配置结构
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub packaging_activities: Vec<String>,
    pub qa_activity: String,
    pub transfer_activity: String,
    pub allow_empty_sku_breakdown: bool,
}

impl MockConfig {
    /// 创建默认配置
    pub fn default() -> Self {
        Self {
            packaging_activities: config_defaults::PACKAGING_ACTIVITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            qa_activity: config_defaults::QA_ACTIVITY.to_string(),
            transfer_activity: config_defaults::TRANSFER_ACTIVITY.to_string(),
            allow_empty_sku_breakdown: true,
        }
    }

    /// 空 SKU 明细视为错误
    pub fn strict_sku_breakdown() -> Self {
        let mut config = Self::default();
        config.allow_empty_sku_breakdown = false;
        config
    }

    /// 自定义包装工序名单
    pub fn with_packaging(names: &[&str]) -> Self {
        let mut config = Self::default();
        config.packaging_activities = names.iter().map(|s| s.to_string()).collect();
        config
    }
}

#[async_trait]
impl ActivityConfigReader for MockConfig {
    async fn get_packaging_activities(&self) -> ConfigResult<Vec<String>> {
        Ok(self.packaging_activities.clone())
    }

    async fn get_qa_activity(&self) -> ConfigResult<String> {
        Ok(self.qa_activity.clone())
    }

    async fn get_transfer_activity(&self) -> ConfigResult<String> {
        Ok(self.transfer_activity.clone())
    }

    async fn get_allow_empty_sku_breakdown(&self) -> ConfigResult<bool> {
        Ok(self.allow_empty_sku_breakdown)
    }
}

// ==========================================
// 内存目录 (SKU 目录 + 批次在库 + 散装在库)
// ==========================================
#[derive(Default)]
pub struct InMemoryCatalog {
    skus: Mutex<HashMap<String, Vec<SkuInfo>>>,
    stock: Mutex<HashMap<String, Vec<OnHandStock>>>,
    bulk: Mutex<HashMap<(String, String), f64>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sku(&self, item: &str, sku_id: i64, pack_size: &str, uom: &str) {
        self.skus
            .lock()
            .unwrap()
            .entry(item.to_string())
            .or_default()
            .push(SkuInfo {
                sku_id,
                pack_size: pack_size.to_string(),
                uom: uom.to_string(),
            });
    }

    pub fn set_on_hand(&self, batch_number: &str, sku_id: i64, pack_size: &str, uom: &str, qty: i64) {
        let mut stock = self.stock.lock().unwrap();
        let lines = stock.entry(batch_number.to_string()).or_default();
        lines.retain(|s| s.sku_id != sku_id);
        lines.push(OnHandStock {
            sku_id,
            pack_size: pack_size.to_string(),
            uom: uom.to_string(),
            qty,
        });
    }

    /// 散装在库,与包装规格同单位 (换算系数 1)
    pub fn set_bulk(&self, item: &str, batch_number: &str, qty_on_hand: f64) {
        self.bulk
            .lock()
            .unwrap()
            .insert((item.to_string(), batch_number.to_string()), qty_on_hand);
    }
}

#[async_trait]
impl SkuCatalogReader for InMemoryCatalog {
    async fn list_active_skus(&self, item: &str) -> CatalogResult<Vec<SkuInfo>> {
        Ok(self.skus.lock().unwrap().get(item).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl BatchStockReader for InMemoryCatalog {
    async fn on_hand(&self, batch_number: &str) -> CatalogResult<Vec<OnHandStock>> {
        Ok(self
            .stock
            .lock()
            .unwrap()
            .get(batch_number)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl BulkStockReader for InMemoryCatalog {
    async fn bulk_stock(&self, item: &str, batch_number: &str) -> CatalogResult<BulkStock> {
        let qty_on_hand = self
            .bulk
            .lock()
            .unwrap()
            .get(&(item.to_string(), batch_number.to_string()))
            .copied()
            .unwrap_or(0.0);
        Ok(BulkStock {
            qty_on_hand,
            conversion_to_base: 1.0,
            uom_base: None,
        })
    }
}
