/// `MM:SS`, minutes not capped at 59. Negative or non-finite input reads
/// as zero.
pub fn format_duration(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 { secs.floor() as u64 } else { 0 };
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn format_time_ago(played_at_ms: i64, now_ms: i64) -> String {
    let minutes = (now_ms - played_at_ms).max(0) / 60_000;
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if minutes < 60 * 24 {
        format!("{} h ago", minutes / 60)
    } else {
        format!("{} d ago", minutes / (60 * 24))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(0.0), "00:00");
        assert_eq!(format_duration(65.9), "01:05");
        assert_eq!(format_duration(3725.0), "62:05");
        assert_eq!(format_duration(f64::NAN), "00:00");
        assert_eq!(format_duration(-3.0), "00:00");
    }

    #[test]
    fn time_ago_buckets() {
        let now = 10 * 86_400_000;
        assert_eq!(format_time_ago(now - 10_000, now), "just now");
        assert_eq!(format_time_ago(now - 5 * 60_000, now), "5 min ago");
        assert_eq!(format_time_ago(now - 3 * 3_600_000, now), "3 h ago");
        assert_eq!(format_time_ago(now - 2 * 86_400_000, now), "2 d ago");
        assert_eq!(format_time_ago(now + 1, now), "just now");
    }
}
