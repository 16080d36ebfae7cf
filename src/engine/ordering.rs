// ==========================================
// 生产执行日志 - 未完工列表排序
// ==========================================
// 排序键: log_date → item (忽略大小写) → batch_number (数字段按数值) → plant_id
// ==========================================

use crate::domain::work_log::WorkLogEntry;
use std::cmp::Ordering;

/// 自然排序比较: 连续数字按数值比较,其余按字符忽略大小写比较
///
/// 例: "B-9" < "B-10" < "b-11"
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut left);
                let nb = take_digits(&mut right);
                let ord = cmp_digit_runs(&na, &nb);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }

    // 仅大小写或前导零不同的串仍需稳定的全序
    a.cmp(b)
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// 未完工列表的展示排序
pub fn sort_pending(entries: &mut [WorkLogEntry]) {
    entries.sort_by(|a, b| {
        a.log_date
            .cmp(&b.log_date)
            .then_with(|| cmp_case_insensitive(&a.item, &b.item))
            .then_with(|| natural_cmp(&a.batch_number, &b.batch_number))
            .then_with(|| {
                natural_cmp(
                    a.location.plant_id.as_deref().unwrap_or(""),
                    b.location.plant_id.as_deref().unwrap_or(""),
                )
            })
    });
}
