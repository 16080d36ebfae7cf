// ==========================================
// 生产执行日志 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::activity_config_trait::{ActivityConfigReader, ConfigResult};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (存在则覆盖)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// 写入缺省配置 (已存在的键不覆盖)
    ///
    /// # 返回
    /// - 实际写入的键数量
    pub fn seed_defaults(&self) -> ConfigResult<usize> {
        let packaging = serde_json::to_string(&config_defaults::PACKAGING_ACTIVITIES)?;
        let defaults = [
            (config_keys::PACKAGING_ACTIVITIES, packaging.as_str()),
            (config_keys::QA_ACTIVITY, config_defaults::QA_ACTIVITY),
            (config_keys::TRANSFER_ACTIVITY, config_defaults::TRANSFER_ACTIVITY),
            (config_keys::ALLOW_EMPTY_SKU_BREAKDOWN, "true"),
        ];

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let mut count = 0;
        for (key, value) in defaults {
            count += conn.execute(
                "INSERT OR IGNORE INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
                params![key, value],
            )?;
        }
        Ok(count)
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

// ==========================================
// ActivityConfigReader 实现
// ==========================================
#[async_trait]
impl ActivityConfigReader for ConfigManager {
    async fn get_packaging_activities(&self) -> ConfigResult<Vec<String>> {
        let defaults = || {
            config_defaults::PACKAGING_ACTIVITIES
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
        };

        let raw = match self.get_config_value(config_keys::PACKAGING_ACTIVITIES)? {
            Some(v) => v,
            None => return Ok(defaults()),
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(list) => {
                let list: Vec<String> = list
                    .into_iter()
                    .filter(|s| !s.trim().is_empty())
                    .collect();
                if list.is_empty() {
                    warn!(key = config_keys::PACKAGING_ACTIVITIES, "包装工序名单为空, 使用默认值");
                    Ok(defaults())
                } else {
                    Ok(list)
                }
            }
            Err(e) => {
                warn!(
                    key = config_keys::PACKAGING_ACTIVITIES,
                    error = %e,
                    "包装工序名单格式错误, 使用默认值"
                );
                Ok(defaults())
            }
        }
    }

    async fn get_qa_activity(&self) -> ConfigResult<String> {
        let value =
            self.get_config_or_default(config_keys::QA_ACTIVITY, config_defaults::QA_ACTIVITY)?;
        if value.trim().is_empty() {
            return Ok(config_defaults::QA_ACTIVITY.to_string());
        }
        Ok(value)
    }

    async fn get_transfer_activity(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(
            config_keys::TRANSFER_ACTIVITY,
            config_defaults::TRANSFER_ACTIVITY,
        )?;
        if value.trim().is_empty() {
            return Ok(config_defaults::TRANSFER_ACTIVITY.to_string());
        }
        Ok(value)
    }

    async fn get_allow_empty_sku_breakdown(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::ALLOW_EMPTY_SKU_BREAKDOWN, "true")?;
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => {
                warn!(
                    key = config_keys::ALLOW_EMPTY_SKU_BREAKDOWN,
                    value = %other,
                    "布尔配置无法解析, 使用默认值 true"
                );
                Ok(true)
            }
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 工序分类
    pub const PACKAGING_ACTIVITIES: &str = "worklog.packaging_activities"; // JSON 数组
    pub const QA_ACTIVITY: &str = "worklog.qa_activity";
    pub const TRANSFER_ACTIVITY: &str = "worklog.transfer_activity";

    // 完工校验
    pub const ALLOW_EMPTY_SKU_BREAKDOWN: &str = "worklog.allow_empty_sku_breakdown";
}

// ==========================================
// 缺省配置值
// ==========================================
pub mod config_defaults {
    pub const PACKAGING_ACTIVITIES: [&str; 6] = [
        "Bottling",
        "Bottling and Labelling",
        "Bottling, Labelling and Cartoning",
        "Capsule Monocarton Packing",
        "Monocarton Packing",
        "Monocarton Packing and Cartoning",
    ];
    pub const QA_ACTIVITY: &str = "Finished Goods Quality Assessment";
    pub const TRANSFER_ACTIVITY: &str = "Transfer to FG Store";
}
