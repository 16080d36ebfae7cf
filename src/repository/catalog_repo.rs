// ==========================================
// 生产执行日志 - 产品目录/在库只读仓储
// ==========================================
// 对齐: products / product_skus / bottled_stock_on_hand / fg_bulk_stock / activities 表
// 红线: 只读,由外部主数据维护
// ==========================================

use crate::domain::catalog::{BulkStock, OnHandStock, SkuInfo};
use crate::engine::catalog_reader::{
    BatchStockReader, BulkStockReader, CatalogResult, SkuCatalogReader,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 物料的有效 SKU (按包装规格数值升序)
    pub fn find_active_skus(&self, item: &str) -> RepositoryResult<Vec<SkuInfo>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ps.id, ps.pack_size, ps.uom
            FROM product_skus ps
            JOIN products p ON p.id = ps.product_id
            WHERE p.item = ?1 AND ps.is_active = 1
            ORDER BY CAST(ps.pack_size AS REAL), ps.id
            "#,
        )?;
        let skus = stmt
            .query_map(params![item], |row| {
                Ok(SkuInfo {
                    sku_id: row.get(0)?,
                    pack_size: row.get(1)?,
                    uom: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(skus)
    }

    /// 批次在库 (只返回数量 > 0 的 SKU)
    pub fn find_on_hand(&self, batch_number: &str) -> RepositoryResult<Vec<OnHandStock>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT sku_id, pack_size, uom, on_hand
            FROM bottled_stock_on_hand
            WHERE batch_number = ?1 AND on_hand > 0
            ORDER BY CAST(pack_size AS REAL), sku_id
            "#,
        )?;
        let stock = stmt
            .query_map(params![batch_number], |row| {
                Ok(OnHandStock {
                    sku_id: row.get(0)?,
                    pack_size: row.get(1)?,
                    uom: row.get(2)?,
                    qty: row.get(3)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(stock)
    }

    /// 物料+批号的散装在库与换算系数
    ///
    /// - 无在库记录: qty_on_hand = 0
    /// - 换算系数为空或非正: 按 1 处理
    pub fn find_bulk_stock(&self, item: &str, batch_number: &str) -> RepositoryResult<BulkStock> {
        let conn = self.get_conn()?;
        let qty_on_hand: Option<f64> = conn
            .query_row(
                "SELECT qty_on_hand FROM fg_bulk_stock WHERE item = ?1 AND batch_number = ?2",
                params![item, batch_number],
                |row| row.get(0),
            )
            .optional()?;
        let product: Option<(Option<f64>, Option<String>)> = conn
            .query_row(
                "SELECT conversion_to_base, uom_base FROM products WHERE item = ?1",
                params![item],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (factor, uom_base) = product.unwrap_or((None, None));

        Ok(BulkStock {
            qty_on_hand: qty_on_hand.unwrap_or(0.0),
            conversion_to_base: factor.filter(|f| *f > 0.0).unwrap_or(1.0),
            uom_base,
        })
    }

    /// 工序标准工期 (天); 工序未登记或未设置工期时返回 None
    pub fn find_duration_days(&self, activity: &str) -> RepositoryResult<Option<i64>> {
        let conn = self.get_conn()?;
        let days: Option<Option<i64>> = conn
            .query_row(
                "SELECT duration_days FROM activities WHERE activity_name = ?1",
                params![activity],
                |row| row.get(0),
            )
            .optional()?;
        Ok(days.flatten())
    }
}

#[async_trait]
impl SkuCatalogReader for SqliteCatalogRepository {
    async fn list_active_skus(&self, item: &str) -> CatalogResult<Vec<SkuInfo>> {
        Ok(self.find_active_skus(item)?)
    }
}

#[async_trait]
impl BatchStockReader for SqliteCatalogRepository {
    async fn on_hand(&self, batch_number: &str) -> CatalogResult<Vec<OnHandStock>> {
        Ok(self.find_on_hand(batch_number)?)
    }
}

#[async_trait]
impl BulkStockReader for SqliteCatalogRepository {
    async fn bulk_stock(&self, item: &str, batch_number: &str) -> CatalogResult<BulkStock> {
        Ok(self.find_bulk_stock(item, batch_number)?)
    }
}
