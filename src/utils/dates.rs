//! 日期引擎
//!
//! 纯函数：报表日期区间计算、门户日期解析、新鲜度校验。
//! 不做任何 I/O。

use anyhow::{anyhow, Result};
use chrono::{Datelike, Duration, NaiveDate};

/// 按参考日期计算报表的日期区间
///
/// 结束日期 = 参考日期；
/// 起始日期 = 参考日期往前推"参考月份的上一个月的实际天数"。
/// 这样滚动的"往前一个月"窗口在 28/29/30/31 天的月份上都是准确的，
/// 而不是固定减 30 天。
pub fn compute_range(reference: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let first_of_month = reference
        .with_day(1)
        .ok_or_else(|| anyhow!("无法取 {} 所在月份的第一天", reference))?;
    // 上个月最后一天的 day() 就是上个月的天数
    let last_of_prev_month = first_of_month
        .pred_opt()
        .ok_or_else(|| anyhow!("无法取 {} 的前一天", first_of_month))?;
    let days_in_prev_month = i64::from(last_of_prev_month.day());

    let start = reference - Duration::days(days_in_prev_month);
    Ok((start, reference))
}

/// 校验参考日期的新鲜度
///
/// 只有 0 <= 今天 - 参考日期 <= max_age_days 才算新鲜；
/// 未来日期（负差值）同样视为无效。
pub fn is_fresh(reference: NaiveDate, today: NaiveDate, max_age_days: i64) -> bool {
    let diff = (today - reference).num_days();
    diff >= 0 && diff <= max_age_days
}

/// 解析门户给出的日期
///
/// 门户栅格显示 DD-MM-YYYY，但个别页面已经是 ISO 格式，两种都接受
pub fn parse_portal_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%d-%m-%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| {
            anyhow::Error::new(crate::error::AppError::Business(
                crate::error::BusinessError::ReferenceDateUnparsable {
                    raw: trimmed.to_string(),
                },
            ))
        })
}

/// 转成门户日期控件要的 ISO 格式
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("测试日期应该有效")
    }

    #[test]
    fn test_compute_range_uses_previous_month_length() {
        // 对 12 个月逐一验证：起始日期 = 参考日期 - 上个月天数
        let prev_month_days = [31, 31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30];
        for month in 1..=12u32 {
            let reference = date(2025, month, 15);
            let (start, end) = compute_range(reference).expect("区间计算不应失败");
            assert_eq!(end, reference);
            let expected = i64::from(prev_month_days[(month - 1) as usize]);
            assert_eq!(
                (reference - start).num_days(),
                expected,
                "{} 月的窗口宽度不对",
                month
            );
        }
    }

    #[test]
    fn test_compute_range_leap_february() {
        // 2024 年是闰年：3 月的参考日期要往前推 29 天
        let (start, end) = compute_range(date(2024, 3, 10)).expect("区间计算不应失败");
        assert_eq!(end, date(2024, 3, 10));
        assert_eq!(start, date(2024, 2, 10));
        assert_eq!((end - start).num_days(), 29);

        // 平年只推 28 天
        let (start, _) = compute_range(date(2025, 3, 10)).expect("区间计算不应失败");
        assert_eq!(start, date(2025, 2, 10));
    }

    #[test]
    fn test_is_fresh_boundaries() {
        let today = date(2026, 8, 6);
        // 正好 2 天前：有效
        assert!(is_fresh(date(2026, 8, 4), today, 2));
        // 3 天前：过旧
        assert!(!is_fresh(date(2026, 8, 3), today, 2));
        // 当天：有效
        assert!(is_fresh(today, today, 2));
        // 未来日期：无效
        assert!(!is_fresh(date(2026, 8, 7), today, 2));
    }

    #[test]
    fn test_parse_portal_date_formats() {
        assert_eq!(
            parse_portal_date("06-08-2026").expect("DD-MM-YYYY 应可解析"),
            date(2026, 8, 6)
        );
        assert_eq!(
            parse_portal_date(" 2026-08-06 ").expect("ISO 格式应可解析"),
            date(2026, 8, 6)
        );
        assert!(parse_portal_date("no es fecha").is_err());
    }

    #[test]
    fn test_to_iso() {
        assert_eq!(to_iso(date(2026, 1, 5)), "2026-01-05");
    }
}
