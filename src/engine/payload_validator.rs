// ==========================================
// 生产执行日志 - 完工数据校验器
// ==========================================
// 职责: 按工序类型校验 CompletionPayload,输出规范化完工数据
// 红线: 只读 (SKU 目录 / 批次在库 / 散装在库),任何失败都不产生副作用
// ==========================================

use crate::domain::catalog::{BulkStock, OnHandStock, SkuInfo};
use crate::domain::completion::{
    CompletionData, CompletionPayload, NormalizedPayload, SkuCount, ValidatedSkuLine,
};
use crate::domain::types::ActivityKind;
use crate::engine::catalog_reader::{BatchStockReader, BulkStockReader, SkuCatalogReader};
use std::collections::HashSet;
use thiserror::Error;

/// 包装量与散装在库比较时的容差 (基本单位)
pub const BULK_STOCK_TOLERANCE: f64 = 0.001;

// ==========================================
// 校验错误
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("化验单号不能为空")]
    MissingLabReference,

    #[error("加工后数量必须大于 0: {qty}")]
    NonPositiveQty { qty: f64 },

    #[error("SKU 数量不能为负数 (sku_id={sku_id}, count={count})")]
    NegativeCount { sku_id: i64, count: i64 },

    #[error("SKU 重复提交 (sku_id={sku_id})")]
    DuplicateSku { sku_id: i64 },

    #[error("SKU 不属于物料的有效规格 (sku_id={sku_id}, item={item})")]
    UnknownSku { sku_id: i64, item: String },

    #[error("批次无该 SKU 在库 (sku_id={sku_id}, batch={batch_number})")]
    NotInStock { sku_id: i64, batch_number: String },

    #[error("转库数量超过在库数量 (sku_id={sku_id}, requested={requested}, on_hand={on_hand})")]
    ExceedsOnHand {
        sku_id: i64,
        requested: i64,
        on_hand: i64,
    },

    #[error("SKU 明细为空")]
    EmptySkuBreakdown,

    #[error("包装规格无法换算数量 (sku_id={sku_id}, pack_size={pack_size})")]
    UnmeasurablePackSize { sku_id: i64, pack_size: String },

    #[error("包装量超过散装在库 (requested={requested:.3}, available={available:.3})")]
    ExceedsBulkStock {
        requested: f64,
        available: f64,
        uom_base: Option<String>,
    },
}

/// 需要操作员确认的情形
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationRequired {
    /// 通用工序未填写加工后数量/单位
    ProceedWithoutQty,
}

/// 校验拒绝原因
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadRejection {
    #[error("需要确认: {0:?}")]
    NeedsConfirmation(ConfirmationRequired),

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("目录读取失败: {0}")]
    LookupFailed(String),
}

// ==========================================
// ValidationContext - 校验上下文
// ==========================================
pub struct ValidationContext<'a> {
    pub item: &'a str,
    pub batch_number: &'a str,
    pub catalog: &'a dyn SkuCatalogReader,
    pub stock: &'a dyn BatchStockReader,
    pub bulk: &'a dyn BulkStockReader,
    /// 包装/转库完工时是否接受空的 SKU 明细
    pub allow_empty_sku_breakdown: bool,
}

// ==========================================
// CompletionPayloadValidator
// ==========================================
pub struct CompletionPayloadValidator;

impl CompletionPayloadValidator {
    /// 校验完工数据
    ///
    /// # 返回
    /// - `Ok(NormalizedPayload)`: 仅包含与工序类型匹配的一组完工数据
    /// - `Err(NeedsConfirmation)`: 通用工序缺数量/单位且未确认
    /// - `Err(Invalid)`: 数据不合法
    pub async fn validate(
        kind: ActivityKind,
        payload: &CompletionPayload,
        ctx: &ValidationContext<'_>,
    ) -> Result<NormalizedPayload, PayloadRejection> {
        let data = match kind {
            ActivityKind::QualityAssessment => Self::validate_lab_ref(payload)?,
            ActivityKind::Generic => Self::validate_quantity(payload)?,
            ActivityKind::PackagingOutput => {
                let lines = Self::prepare_sku_lines(&payload.sku_lines)?;
                if lines.is_empty() {
                    Self::empty_breakdown(ctx)?
                } else {
                    let catalog = ctx
                        .catalog
                        .list_active_skus(ctx.item)
                        .await
                        .map_err(|e| PayloadRejection::LookupFailed(e.to_string()))?;
                    let validated = Self::match_catalog(&lines, &catalog, ctx.item)?;
                    let bulk = ctx
                        .bulk
                        .bulk_stock(ctx.item, ctx.batch_number)
                        .await
                        .map_err(|e| PayloadRejection::LookupFailed(e.to_string()))?;
                    Self::check_bulk_stock(&validated, &bulk)?;
                    CompletionData::sku_breakdown(validated)
                }
            }
            ActivityKind::TransferToStore => {
                let lines = Self::prepare_sku_lines(&payload.sku_lines)?;
                if lines.is_empty() {
                    Self::empty_breakdown(ctx)?
                } else {
                    let stock = ctx
                        .stock
                        .on_hand(ctx.batch_number)
                        .await
                        .map_err(|e| PayloadRejection::LookupFailed(e.to_string()))?;
                    CompletionData::sku_breakdown(Self::match_stock(
                        &lines,
                        &stock,
                        ctx.batch_number,
                    )?)
                }
            }
        };

        Ok(NormalizedPayload { kind, data })
    }

    // ==========================================
    // 分类型校验
    // ==========================================

    fn validate_lab_ref(payload: &CompletionPayload) -> Result<CompletionData, PayloadRejection> {
        match payload
            .lab_ref_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(lab_ref) => Ok(CompletionData::LabReference {
                lab_ref: lab_ref.to_string(),
            }),
            None => Err(ValidationError::MissingLabReference.into()),
        }
    }

    fn validate_quantity(payload: &CompletionPayload) -> Result<CompletionData, PayloadRejection> {
        if let Some(qty) = payload.qty_after_process {
            if !qty.is_finite() || qty <= 0.0 {
                return Err(ValidationError::NonPositiveQty { qty }.into());
            }
        }

        let uom = payload
            .qty_uom
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (payload.qty_after_process, uom) {
            (Some(qty), Some(uom)) => Ok(CompletionData::Quantity {
                qty: Some(qty),
                uom: Some(uom.to_string()),
            }),
            _ if payload.proceed_without_qty => Ok(CompletionData::Quantity {
                qty: None,
                uom: None,
            }),
            _ => Err(PayloadRejection::NeedsConfirmation(
                ConfirmationRequired::ProceedWithoutQty,
            )),
        }
    }

    fn empty_breakdown(ctx: &ValidationContext<'_>) -> Result<CompletionData, PayloadRejection> {
        if ctx.allow_empty_sku_breakdown {
            Ok(CompletionData::sku_breakdown(Vec::new()))
        } else {
            Err(ValidationError::EmptySkuBreakdown.into())
        }
    }

    // ==========================================
    // SKU 明细
    // ==========================================

    /// 负数报错、零值丢弃、重复报错
    fn prepare_sku_lines(lines: &[SkuCount]) -> Result<Vec<SkuCount>, ValidationError> {
        if let Some(neg) = lines.iter().find(|l| l.count < 0) {
            return Err(ValidationError::NegativeCount {
                sku_id: neg.sku_id,
                count: neg.count,
            });
        }

        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(lines.len());
        for line in lines.iter().filter(|l| l.count > 0) {
            if !seen.insert(line.sku_id) {
                return Err(ValidationError::DuplicateSku {
                    sku_id: line.sku_id,
                });
            }
            kept.push(*line);
        }
        Ok(kept)
    }

    /// 按物料有效 SKU 补全规格,输出顺序与目录一致
    fn match_catalog(
        lines: &[SkuCount],
        catalog: &[SkuInfo],
        item: &str,
    ) -> Result<Vec<ValidatedSkuLine>, ValidationError> {
        let mut validated = Vec::with_capacity(lines.len());
        for line in lines {
            let position = catalog
                .iter()
                .position(|s| s.sku_id == line.sku_id)
                .ok_or_else(|| ValidationError::UnknownSku {
                    sku_id: line.sku_id,
                    item: item.to_string(),
                })?;
            let sku = &catalog[position];
            validated.push((
                position,
                ValidatedSkuLine {
                    sku_id: sku.sku_id,
                    pack_size: sku.pack_size.clone(),
                    uom: sku.uom.clone(),
                    count: line.count,
                },
            ));
        }
        validated.sort_by_key(|(position, _)| *position);
        Ok(validated.into_iter().map(|(_, line)| line).collect())
    }

    /// 包装总量 (规格数值 × 数量 × 换算系数) 不得超过散装在库
    fn check_bulk_stock(lines: &[ValidatedSkuLine], bulk: &BulkStock) -> Result<(), ValidationError> {
        let mut total_units = 0.0;
        for line in lines {
            let size = line
                .pack_size_value()
                .ok_or_else(|| ValidationError::UnmeasurablePackSize {
                    sku_id: line.sku_id,
                    pack_size: line.pack_size.clone(),
                })?;
            total_units += size * line.count as f64;
        }

        let requested = total_units * bulk.conversion_to_base;
        if requested - bulk.qty_on_hand > BULK_STOCK_TOLERANCE {
            return Err(ValidationError::ExceedsBulkStock {
                requested,
                available: bulk.qty_on_hand,
                uom_base: bulk.uom_base.clone(),
            });
        }
        Ok(())
    }

    /// 按批次在库补全规格并检查数量上限
    fn match_stock(
        lines: &[SkuCount],
        stock: &[OnHandStock],
        batch_number: &str,
    ) -> Result<Vec<ValidatedSkuLine>, ValidationError> {
        let mut validated = Vec::with_capacity(lines.len());
        for line in lines {
            let position = stock
                .iter()
                .position(|s| s.sku_id == line.sku_id)
                .ok_or_else(|| ValidationError::NotInStock {
                    sku_id: line.sku_id,
                    batch_number: batch_number.to_string(),
                })?;
            let on_hand = &stock[position];
            if line.count > on_hand.qty {
                return Err(ValidationError::ExceedsOnHand {
                    sku_id: line.sku_id,
                    requested: line.count,
                    on_hand: on_hand.qty,
                });
            }
            validated.push((
                position,
                ValidatedSkuLine {
                    sku_id: on_hand.sku_id,
                    pack_size: on_hand.pack_size.clone(),
                    uom: on_hand.uom.clone(),
                    count: line.count,
                },
            ));
        }
        validated.sort_by_key(|(position, _)| *position);
        Ok(validated.into_iter().map(|(_, line)| line).collect())
    }
}
