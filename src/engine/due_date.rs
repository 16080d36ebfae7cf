// ==========================================
// 生产执行日志 - 到期日推算
// ==========================================
// 规则: 从开工日起逐日后推,周日不计入工作日
// ==========================================

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// 每 7 个自然日恰好含 6 个工作日
const WORKING_DAYS_PER_WEEK: u32 = 6;

/// 开工日 + n 个工作日 (跳过周日)
///
/// - n = 0 时返回开工日本身
/// - 结果超出日期范围时返回 None
pub fn add_working_days(start: NaiveDate, working_days: u32) -> Option<NaiveDate> {
    let weeks = u64::from(working_days / WORKING_DAYS_PER_WEEK);
    let mut date = start.checked_add_days(Days::new(weeks * 7))?;
    // 整周落在周日时,最后一个工作日是前一天
    if working_days % WORKING_DAYS_PER_WEEK == 0 && weeks > 0 && date.weekday() == Weekday::Sun {
        return date.checked_sub_days(Days::new(1));
    }

    let mut counted = 0;
    while counted < working_days % WORKING_DAYS_PER_WEEK {
        date = date.checked_add_days(Days::new(1))?;
        if date.weekday() != Weekday::Sun {
            counted += 1;
        }
    }
    Some(date)
}

/// 按工序标准工期推算到期日; 工期缺失、为负或超出日期范围时不推算
pub fn derive_due_date(started_on: Option<NaiveDate>, duration_days: Option<i64>) -> Option<NaiveDate> {
    let start = started_on?;
    let days = u32::try_from(duration_days?).ok()?;
    add_working_days(start, days)
}
