pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

/// Relative-time label for a draft save timestamp.
///
/// `now_ms` is passed in so callers driving a status line can re-render
/// on their own tick without touching the clock here.
pub(crate) fn relative_time_text(saved_ms: Option<i64>, now_ms: i64) -> String {
    let Some(saved) = saved_ms else {
        return "Never saved".to_string();
    };

    let diff_ms = (now_ms - saved).max(0);
    let minutes = diff_ms / 60_000;

    if minutes < 1 {
        return "Just now".to_string();
    }
    if minutes < 60 {
        return format!("{} minute{} ago", minutes, plural(minutes));
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{} hour{} ago", hours, plural(hours));
    }

    let days = hours / 24;
    format!("{} day{} ago", days, plural(days))
}

fn plural(n: i64) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_time_never_saved() {
        assert_eq!(relative_time_text(None, 1_000_000), "Never saved");
    }

    #[test]
    fn test_relative_time_just_now() {
        assert_eq!(relative_time_text(Some(1_000), 1_000), "Just now");
        assert_eq!(relative_time_text(Some(1_000), 59_999 + 1_000), "Just now");
    }

    #[test]
    fn test_relative_time_minutes() {
        assert_eq!(relative_time_text(Some(0), 60_000), "1 minute ago");
        assert_eq!(relative_time_text(Some(0), 5 * 60_000), "5 minutes ago");
        assert_eq!(relative_time_text(Some(0), 59 * 60_000), "59 minutes ago");
    }

    #[test]
    fn test_relative_time_hours_and_days() {
        assert_eq!(relative_time_text(Some(0), 60 * 60_000), "1 hour ago");
        assert_eq!(relative_time_text(Some(0), 23 * 60 * 60_000), "23 hours ago");
        assert_eq!(relative_time_text(Some(0), 24 * 60 * 60_000), "1 day ago");
        assert_eq!(relative_time_text(Some(0), 72 * 60 * 60_000), "3 days ago");
    }

    #[test]
    fn test_relative_time_clock_skew_is_clamped() {
        // A saved_ms slightly in the future must not underflow into days.
        assert_eq!(relative_time_text(Some(10_000), 0), "Just now");
    }
}
