// ==========================================
// 生产执行日志 - 工序分类配置读取 Trait
// ==========================================
// 职责: 定义工序分类所需的配置读取接口 (不包含实现)
// 红线: 不包含配置写入、不包含分类逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果 (错误需可跨线程传递)
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ActivityConfigReader Trait
// ==========================================
// 用途: ActivityClassifier 加载工序名单
// 实现者: ConfigManager (从 config_kv 表读取)
#[async_trait]
pub trait ActivityConfigReader: Send + Sync {
    /// 获取包装产出类工序名单
    ///
    /// # 默认值
    /// - Bottling / Bottling and Labelling / Bottling, Labelling and Cartoning /
    ///   Capsule Monocarton Packing / Monocarton Packing / Monocarton Packing and Cartoning
    async fn get_packaging_activities(&self) -> ConfigResult<Vec<String>>;

    /// 获取成品质检工序名
    ///
    /// # 默认值
    /// - "Finished Goods Quality Assessment"
    async fn get_qa_activity(&self) -> ConfigResult<String>;

    /// 获取转成品库工序名
    ///
    /// # 默认值
    /// - "Transfer to FG Store"
    async fn get_transfer_activity(&self) -> ConfigResult<String>;

    /// 包装/转库完工时是否允许空的 SKU 明细
    ///
    /// # 默认值
    /// - true
    async fn get_allow_empty_sku_breakdown(&self) -> ConfigResult<bool>;
}
