// ==========================================
// 生产执行日志 - 包装分配数据仓储
// ==========================================
// 对齐: packaging_events / event_skus 表
// 不变量: work_log_id 唯一 (每条工序日志至多一个包装事件)
// 不变量: 明细整体替换 (先删后插),读者不会看到新旧混合的明细
// ==========================================


use crate::domain::completion::SkuCount;
use crate::domain::packaging::{EventSkuLine, PackagingAllocation, PackagingEvent};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// PackagingAllocationStore - 包装分配仓储
// ==========================================
// `upsert` / `clear` 自带事务;
// `upsert_in` / `clear_in` 在调用方事务内执行 (状态机将其与工序日志更新合并为一个原子单元)
pub struct PackagingAllocationStore {
    conn: Arc<Mutex<Connection>>,
}

impl PackagingAllocationStore {
    /// 创建新的包装分配仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作 (自带事务)
    // ==========================================

    /// 写入/替换某工序日志的包装事件与明细
    ///
    /// # 返回
    /// - `Ok(event_id)`: 包装事件 id (已存在则复用)
    pub fn upsert(
        &self,
        work_log_id: &str,
        event_type: &str,
        lines: &[SkuCount],
    ) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let event_id = Self::upsert_in(&tx, work_log_id, event_type, lines)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(event_id)
    }

    /// 清除某工序日志的包装事件与明细 (幂等)
    ///
    /// # 返回
    /// - `Ok(true)`: 存在并已删除
    /// - `Ok(false)`: 原本就没有
    pub fn clear(&self, work_log_id: &str) -> RepositoryResult<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let removed = Self::clear_in(&tx, work_log_id)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(removed)
    }

    // ==========================================
    // 写入操作 (调用方事务内)
    // ==========================================

    pub fn upsert_in(
        conn: &Connection,
        work_log_id: &str,
        event_type: &str,
        lines: &[SkuCount],
    ) -> RepositoryResult<String> {
        let now = Utc::now().naive_utc().format(TS_FMT).to_string();

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM packaging_events WHERE work_log_id = ?1",
                params![work_log_id],
                |row| row.get(0),
            )
            .optional()?;

        let event_id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE packaging_events SET event_type = ?1, updated_at = ?2 WHERE id = ?3",
                    params![event_type, now, id],
                )?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                conn.execute(
                    r#"
                    INSERT INTO packaging_events (id, work_log_id, event_type, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?4)
                    "#,
                    params![id, work_log_id, event_type, now],
                )?;
                id
            }
        };

        conn.execute(
            "DELETE FROM event_skus WHERE packaging_event_id = ?1",
            params![event_id],
        )?;

        let mut inserted = 0usize;
        {
            let mut stmt = conn.prepare(
                "INSERT INTO event_skus (packaging_event_id, sku_id, count) VALUES (?1, ?2, ?3)",
            )?;
            for line in lines.iter().filter(|l| l.count > 0) {
                stmt.execute(params![event_id, line.sku_id, line.count])?;
                inserted += 1;
            }
        }

        debug!(
            work_log_id = %work_log_id,
            event_id = %event_id,
            lines = inserted,
            "包装分配已写入"
        );
        Ok(event_id)
    }

    pub fn clear_in(conn: &Connection, work_log_id: &str) -> RepositoryResult<bool> {
        let event_ids: Vec<String> = {
            let mut stmt =
                conn.prepare("SELECT id FROM packaging_events WHERE work_log_id = ?1")?;
            let ids = stmt
                .query_map(params![work_log_id], |row| row.get::<_, String>(0))?
                .collect::<SqliteResult<Vec<_>>>()?;
            ids
        };

        if event_ids.is_empty() {
            return Ok(false);
        }

        for event_id in &event_ids {
            conn.execute(
                "DELETE FROM event_skus WHERE packaging_event_id = ?1",
                params![event_id],
            )?;
            conn.execute(
                "DELETE FROM packaging_events WHERE id = ?1",
                params![event_id],
            )?;
        }

        debug!(work_log_id = %work_log_id, events = event_ids.len(), "包装分配已清除");
        Ok(true)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询某工序日志的包装事件及明细
    pub fn find_by_work_log(
        &self,
        work_log_id: &str,
    ) -> RepositoryResult<Option<PackagingAllocation>> {
        let conn = self.get_conn()?;
        Self::find_by_work_log_in(&conn, work_log_id)
    }

    pub fn find_by_work_log_in(
        conn: &Connection,
        work_log_id: &str,
    ) -> RepositoryResult<Option<PackagingAllocation>> {
        let event = conn
            .query_row(
                r#"
                SELECT id, work_log_id, event_type, created_at, updated_at
                FROM packaging_events
                WHERE work_log_id = ?1
                "#,
                params![work_log_id],
                |row| {
                    Ok(PackagingEvent {
                        id: row.get(0)?,
                        work_log_id: row.get(1)?,
                        event_type: row.get(2)?,
                        created_at: parse_ts(row.get(3)?, 3)?,
                        updated_at: parse_ts(row.get(4)?, 4)?,
                    })
                },
            )
            .optional()?;

        let event = match event {
            Some(e) => e,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT sku_id, count
            FROM event_skus
            WHERE packaging_event_id = ?1
            ORDER BY sku_id
            "#,
        )?;
        let lines = stmt
            .query_map(params![event.id], |row| {
                Ok(EventSkuLine {
                    sku_id: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(PackagingAllocation { event, lines }))
    }

    /// 统计包装事件总数 (一致性检查/测试)
    pub fn count_events(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM packaging_events", [], |row| row.get(0))?;
        Ok(n)
    }
}

fn parse_ts(s: String, idx: usize) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(&s, TS_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
