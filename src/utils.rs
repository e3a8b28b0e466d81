use chrono::{DateTime, NaiveTime, Utc};

/// Midnight at the start of the (UTC) day containing `date`.
pub(crate) fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    date.with_time(NaiveTime::MIN).single().unwrap_or(date)
}

/// Noon of the (UTC) day containing `date`.
pub(crate) fn noon(date: DateTime<Utc>) -> DateTime<Utc> {
    NaiveTime::from_hms_opt(12, 0, 0)
        .and_then(|t| date.with_time(t).single())
        .unwrap_or(date)
}

/// Convert epoch milliseconds into a timestamp, treating zero as "no date".
pub(crate) fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    if millis == 0 {
        None
    } else {
        DateTime::from_timestamp_millis(millis)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_boundaries() {
        let d = Utc.with_ymd_and_hms(2023, 7, 4, 15, 16, 17).unwrap();
        assert_eq!(
            start_of_day(d),
            Utc.with_ymd_and_hms(2023, 7, 4, 0, 0, 0).unwrap()
        );
        assert_eq!(noon(d), Utc.with_ymd_and_hms(2023, 7, 4, 12, 0, 0).unwrap());
    }

    #[test]
    fn zero_millis_is_none() {
        assert_eq!(from_millis(0), None);
        assert_eq!(
            from_millis(1_000),
            Some(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap())
        );
    }
}
