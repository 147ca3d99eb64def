// libs/consultation-cell/src/services/policy.rs
use chrono::{DateTime, Duration, Utc};

/// A WAITING consultation scheduled longer ago than this is swept to TERMINATED_OPEN.
pub const WAITING_ROOM_TIMEOUT_MINUTES: i64 = 30;

/// Assumed length of one consultation when estimating queue wait.
pub const AVERAGE_CONSULTATION_MINUTES: i64 = 10;

/// Consultations without a schedule date never go stale.
pub fn is_stale(scheduled_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match scheduled_date {
        Some(scheduled) => now - scheduled > Duration::minutes(WAITING_ROOM_TIMEOUT_MINUTES),
        None => false,
    }
}

/// Wait for a 1-based queue position: the patient at the head waits nothing.
pub fn estimated_wait_minutes(queue_position: u32) -> i64 {
    i64::from(queue_position.saturating_sub(1)) * AVERAGE_CONSULTATION_MINUTES
}

pub fn format_wait_time(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        if minutes == 1 {
            "1 min".to_string()
        } else {
            format!("{} mins", minutes)
        }
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

pub fn patient_initials(first_name: Option<&str>, last_name: Option<&str>) -> String {
    [first_name, last_name]
        .into_iter()
        .flatten()
        .filter_map(|name| name.trim().chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn deletion_deadline(closed_at: DateTime<Utc>, retention_hours: i64) -> DateTime<Utc> {
    closed_at + Duration::hours(retention_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_threshold() {
        let now = Utc::now();
        assert!(!is_stale(Some(now - Duration::minutes(30)), now));
        assert!(is_stale(Some(now - Duration::minutes(31)), now));
        assert!(!is_stale(Some(now + Duration::hours(2)), now));
        assert!(!is_stale(None, now));
    }

    #[test]
    fn test_wait_estimate_by_position() {
        assert_eq!(estimated_wait_minutes(1), 0);
        assert_eq!(estimated_wait_minutes(2), 10);
        assert_eq!(estimated_wait_minutes(7), 60);
        assert_eq!(estimated_wait_minutes(0), 0);
    }

    #[test]
    fn test_wait_formatting() {
        assert_eq!(format_wait_time(0), "0 mins");
        assert_eq!(format_wait_time(1), "1 min");
        assert_eq!(format_wait_time(10), "10 mins");
        assert_eq!(format_wait_time(60), "1h 0m");
        assert_eq!(format_wait_time(130), "2h 10m");
    }

    #[test]
    fn test_initials() {
        assert_eq!(patient_initials(Some("ada"), Some("Lovelace")), "AL");
        assert_eq!(patient_initials(Some("Grace"), None), "G");
        assert_eq!(patient_initials(None, None), "");
        assert_eq!(patient_initials(Some("  "), Some("émile")), "É");
    }

    #[test]
    fn test_deletion_deadline() {
        let closed = Utc::now();
        assert_eq!(deletion_deadline(closed, 24) - closed, Duration::hours(24));
    }
}
