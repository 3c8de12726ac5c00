//! Expected delivery date

use chrono::{DateTime, Duration, Utc};

/// Expected delivery: `now` + the slowest product's estimate
///
/// Falls back to `default_days` when no product carries an estimate.
pub fn expected_delivery<I>(now: DateTime<Utc>, estimates: I, default_days: u32) -> DateTime<Utc>
where
    I: IntoIterator<Item = Option<u32>>,
{
    let days = estimates.into_iter().flatten().max().unwrap_or(default_days);
    now + Duration::days(i64::from(days))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uses_slowest_product() {
        let now = Utc::now();
        let at = expected_delivery(now, [Some(2), None, Some(9)], 5);
        assert_eq!(at, now + Duration::days(9));
    }

    #[test]
    fn test_default_when_no_estimates() {
        let now = Utc::now();
        assert_eq!(expected_delivery(now, [None, None], 5), now + Duration::days(5));
        assert_eq!(expected_delivery(now, Vec::new(), 5), now + Duration::days(5));
    }
}
