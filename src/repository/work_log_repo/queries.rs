use super::core::{WorkLogRepository, DATE_FMT, TS_FMT};
use crate::domain::types::WorkLogStatus;
use crate::domain::work_log::{CompletionFields, LocationRef, PendingFilter, WorkLogEntry};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};

const SELECT_WORK_LOG: &str = r#"
    SELECT id, log_date, section_id, subsection_id, area_id, plant_id,
           item, batch_number, batch_size, batch_uom, activity,
           started_on, due_date, status, completed_on,
           qty_after_process, qty_uom, lab_ref_number, sku_breakdown,
           remarks, uploaded_by, created_at, updated_at
    FROM daily_work_log
"#;

impl WorkLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 id 查询单条工序日志
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<WorkLogEntry>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, id)
    }

    /// 在给定连接/事务内按 id 查询
    pub fn find_by_id_in(conn: &Connection, id: &str) -> RepositoryResult<Option<WorkLogEntry>> {
        let sql = format!("{} WHERE id = ?", SELECT_WORK_LOG);
        let entry = conn
            .query_row(&sql, params![id], Self::map_row)
            .optional()?;
        Ok(entry)
    }

    /// 查询同一物料+批号下已完工的工序名 (去重)
    ///
    /// 用途: 质检前置检查; 工序名归类由调用方完成
    pub fn find_done_activities(
        &self,
        item: &str,
        batch_number: &str,
    ) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT DISTINCT activity
            FROM daily_work_log
            WHERE item = ? AND batch_number = ? AND status = ?
            "#,
        )?;
        let activities = stmt
            .query_map(
                params![item, batch_number, WorkLogStatus::Done.as_db_str()],
                |row| row.get::<_, String>(0),
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(activities)
    }

    /// 查询未完工 (Doing / On Hold) 工序日志
    ///
    /// # 参数
    /// - `filter`: 筛选条件,空字段不参与过滤
    /// - `today`: 逾期判定基准日 (due_date < today)
    ///
    /// 结果按 log_date 排序; 更细的展示排序由调用方完成
    pub fn find_pending(
        &self,
        filter: &PendingFilter,
        today: NaiveDate,
    ) -> RepositoryResult<Vec<WorkLogEntry>> {
        let conn = self.get_conn()?;

        let mut sql = format!("{} WHERE status IN (?, ?)", SELECT_WORK_LOG);
        let mut args: Vec<String> = vec![
            WorkLogStatus::Doing.as_db_str().to_string(),
            WorkLogStatus::OnHold.as_db_str().to_string(),
        ];

        if let Some(date) = filter.log_date {
            sql.push_str(" AND log_date = ?");
            args.push(date.format(DATE_FMT).to_string());
        }
        let text_filters = [
            ("section_id", &filter.section_id),
            ("subsection_id", &filter.subsection_id),
            ("area_id", &filter.area_id),
            ("item", &filter.item),
            ("batch_number", &filter.batch_number),
        ];
        for (column, value) in text_filters {
            if let Some(v) = value.as_ref().filter(|v| !v.trim().is_empty()) {
                sql.push_str(&format!(" AND {} = ?", column));
                args.push(v.clone());
            }
        }
        if filter.overdue_only {
            sql.push_str(" AND due_date IS NOT NULL AND due_date < ?");
            args.push(today.format(DATE_FMT).to_string());
        }
        sql.push_str(" ORDER BY log_date");

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(args.iter()), Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 分页列出全部工序日志 (全字段编辑页)
    pub fn list_all(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<WorkLogEntry>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} ORDER BY log_date DESC, created_at DESC LIMIT ? OFFSET ?",
            SELECT_WORK_LOG
        );
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit, offset], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    // ==========================================
    // 行映射
    // ==========================================

    fn map_row(row: &Row) -> SqliteResult<WorkLogEntry> {
        let status_str: String = row.get(13)?;
        let status = WorkLogStatus::from_db_str(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                13,
                Type::Text,
                format!("未知工序状态: {}", status_str).into(),
            )
        })?;

        Ok(WorkLogEntry {
            id: row.get(0)?,
            log_date: parse_date(row, 1)?,
            location: LocationRef {
                section_id: row.get(2)?,
                subsection_id: row.get(3)?,
                area_id: row.get(4)?,
                plant_id: row.get(5)?,
            },
            item: row.get(6)?,
            batch_number: row.get(7)?,
            batch_size: row.get(8)?,
            batch_uom: row.get(9)?,
            activity: row.get(10)?,
            started_on: parse_opt_date(row, 11)?,
            due_date: parse_opt_date(row, 12)?,
            status,
            completed_on: parse_opt_date(row, 14)?,
            completion: CompletionFields {
                qty_after_process: row.get(15)?,
                qty_uom: row.get(16)?,
                lab_ref_number: row.get(17)?,
                sku_breakdown: row.get(18)?,
            },
            remarks: row.get(19)?,
            uploaded_by: row.get(20)?,
            created_at: parse_ts(row, 21)?,
            updated_at: parse_ts(row, 22)?,
        })
    }
}

fn parse_date(row: &Row, idx: usize) -> SqliteResult<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, DATE_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_opt_date(row: &Row, idx: usize) -> SqliteResult<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FMT).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
        None => Ok(None),
    }
}

fn parse_ts(row: &Row, idx: usize) -> SqliteResult<NaiveDateTime> {
    let s: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&s, TS_FMT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
