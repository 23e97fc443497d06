use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

pub(crate) fn format_offset(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.to_string())
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Time, UtcOffset};

    #[test]
    fn format_primitive_outputs_utc_z() {
        let date = Date::from_calendar_date(2025, time::Month::May, 14).unwrap();
        let time = Time::from_hms(8, 5, 0).unwrap();
        assert_eq!(format_primitive(PrimitiveDateTime::new(date, time)), "2025-05-14T08:05:00Z");
    }

    #[test]
    fn format_offset_preserves_offset() {
        let date = Date::from_calendar_date(2025, time::Month::May, 14).unwrap();
        let time = Time::from_hms(8, 5, 0).unwrap();
        let shifted = PrimitiveDateTime::new(date, time)
            .assume_utc()
            .to_offset(UtcOffset::from_hms(8, 0, 0).unwrap());
        assert_eq!(format_offset(shifted), "2025-05-14T16:05:00+08:00");
    }

    #[test]
    fn parse_rfc3339_accepts_offsets_and_rejects_garbage() {
        assert!(parse_rfc3339("2025-05-14T08:05:00.123Z").is_some());
        assert!(parse_rfc3339(" 2025-05-14T16:05:00+08:00 ").is_some());
        assert!(parse_rfc3339("yesterday").is_none());
        assert!(parse_rfc3339("2025-05-14").is_none());
    }
}
