use crate::domain::types::WorkLogStatus;
use crate::domain::work_log::{CompletionFields, NewWorkLogEntry, WorkLogDetails};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub(super) const DATE_FMT: &str = "%Y-%m-%d";
pub(super) const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

pub(super) fn fmt_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format(DATE_FMT).to_string())
}

fn now_ts() -> String {
    Utc::now().naive_utc().format(TS_FMT).to_string()
}

// ==========================================
// WorkLogRepository - 工序日志仓储
// ==========================================
// 写操作分两种形态:
// - `&self` 方法: 自行加锁/开事务
// - `*_in(conn, ..)` 关联函数: 在调用方的事务内执行,供状态机组合成一个原子单元
pub struct WorkLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WorkLogRepository {
    /// 创建新的工序日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在 IMMEDIATE 事务内执行闭包
    ///
    /// - 开始即持有写锁,同一工序日志上的并发迁移被串行化
    /// - 闭包返回 Err 时事务随 drop 回滚,不会留下部分写入
    pub fn with_transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> RepositoryResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let value = f(&tx)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(value)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入工序日志 (不含完工字段)
    ///
    /// # 返回
    /// - `Ok(id)`: 新分配的 id
    /// - `Err(UniqueConstraintViolation)`: 同日期/物料/批号/工序已有记录
    pub fn insert(&self, entry: &NewWorkLogEntry) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_in(&conn, entry)
    }

    /// 在给定连接/事务内插入
    ///
    /// 说明: 新记录总是以非 Done 状态写入 (请求 Done 时先写 Doing,再由状态机完工)
    pub fn insert_in(conn: &Connection, entry: &NewWorkLogEntry) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        let status = match entry.status {
            WorkLogStatus::Done => WorkLogStatus::Doing,
            other => other,
        };
        let d = &entry.details;
        let ts = now_ts();

        conn.execute(
            r#"
            INSERT INTO daily_work_log (
                id, log_date, section_id, subsection_id, area_id, plant_id,
                item, batch_number, batch_size, batch_uom, activity,
                started_on, due_date, status, completed_on,
                qty_after_process, qty_uom, lab_ref_number, sku_breakdown,
                remarks, uploaded_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL, NULL, NULL, ?, ?, ?, ?)
            "#,
            params![
                id,
                d.log_date.format(DATE_FMT).to_string(),
                d.location.section_id,
                d.location.subsection_id,
                d.location.area_id,
                d.location.plant_id,
                d.item,
                d.batch_number,
                d.batch_size,
                d.batch_uom,
                d.activity,
                fmt_date(d.started_on),
                fmt_date(d.due_date),
                status.as_db_str(),
                d.remarks,
                entry.uploaded_by,
                ts,
                ts,
            ],
        )?;

        Ok(id)
    }

    /// 更新状态与完工字段 (四组字段整体覆盖)
    ///
    /// 调用方保证: completed_on 有值 ⟺ status = Done
    pub fn update_status_in(
        conn: &Connection,
        id: &str,
        status: WorkLogStatus,
        completed_on: Option<NaiveDate>,
        fields: &CompletionFields,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE daily_work_log
            SET status = ?, completed_on = ?,
                qty_after_process = ?, qty_uom = ?, lab_ref_number = ?, sku_breakdown = ?,
                updated_at = ?
            WHERE id = ?
            "#,
            params![
                status.as_db_str(),
                fmt_date(completed_on),
                fields.qty_after_process,
                fields.qty_uom,
                fields.lab_ref_number,
                fields.sku_breakdown,
                now_ts(),
                id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkLogEntry".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 更新描述信息 (不触碰状态与完工字段)
    pub fn update_details(&self, id: &str, details: &WorkLogDetails) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::update_details_in(&conn, id, details)
    }

    pub fn update_details_in(
        conn: &Connection,
        id: &str,
        details: &WorkLogDetails,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE daily_work_log
            SET log_date = ?, section_id = ?, subsection_id = ?, area_id = ?, plant_id = ?,
                item = ?, batch_number = ?, batch_size = ?, batch_uom = ?, activity = ?,
                started_on = ?, due_date = ?, remarks = ?, updated_at = ?
            WHERE id = ?
            "#,
            params![
                details.log_date.format(DATE_FMT).to_string(),
                details.location.section_id,
                details.location.subsection_id,
                details.location.area_id,
                details.location.plant_id,
                details.item,
                details.batch_number,
                details.batch_size,
                details.batch_uom,
                details.activity,
                fmt_date(details.started_on),
                fmt_date(details.due_date),
                details.remarks,
                now_ts(),
                id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "WorkLogEntry".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除工序日志行
    ///
    /// 注意: 存在包装事件时会触发外键约束失败,调用方需先清理包装分配
    pub fn delete_in(conn: &Connection, id: &str) -> RepositoryResult<usize> {
        let rows = conn.execute("DELETE FROM daily_work_log WHERE id = ?1", params![id])?;
        Ok(rows)
    }
}
