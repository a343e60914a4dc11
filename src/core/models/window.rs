use chrono::{Duration, NaiveDate, Utc};

/// The UTC day queried by a check: `[start, end)`, i.e. yesterday 00:00
/// up to today 00:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DayWindow {
    /// Window covering the day before `today`.
    pub fn ending_on(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(1),
            end: today,
        }
    }

    pub fn yesterday() -> Self {
        Self::ending_on(Utc::now().date_naive())
    }

    /// The calendar day being reported on.
    pub fn report_date(&self) -> NaiveDate {
        self.start
    }

    /// RFC 3339 timestamps at midnight UTC for both edges.
    pub fn rfc3339_bounds(&self) -> (String, String) {
        (
            format!("{}T00:00:00Z", self.start.format("%Y-%m-%d")),
            format!("{}T00:00:00Z", self.end.format("%Y-%m-%d")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_on_covers_previous_day() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = DayWindow::ending_on(today);
        assert_eq!(window.start, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(window.end, today);
        assert_eq!(window.report_date().to_string(), "2024-02-29");
    }

    #[test]
    fn rfc3339_bounds_are_midnight_utc() {
        let window = DayWindow::ending_on(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let (start, end) = window.rfc3339_bounds();
        assert_eq!(start, "2023-12-31T00:00:00Z");
        assert_eq!(end, "2024-01-01T00:00:00Z");
    }
}
