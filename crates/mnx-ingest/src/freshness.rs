//! Change detection for remote files
//!
//! A file is fetched again when there is no local copy, or when its remote
//! modification time is strictly later than the end of the previous run.
//! The server reports naive local times, so every comparison happens after
//! the stamp has been localized into the server's zone.

use crate::error::{SyncError, SyncResult};
use crate::models::{RawPathInfo, RemoteFileInfo};
use chrono::{DateTime, LocalResult, TimeZone};
use chrono_tz::Tz;

/// Time of the previous successful check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastChecked {
    /// First run: earlier than any modification time
    Never,
    At(DateTime<Tz>),
}

/// Outcome of a freshness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No local copy exists
    Missing,
    /// The remote copy changed after the last check
    Outdated,
    UpToDate,
}

impl Freshness {
    pub fn needs_refresh(self) -> bool {
        !matches!(self, Freshness::UpToDate)
    }
}

/// Decides which files need to be fetched again
#[derive(Debug, Clone, Copy)]
pub struct FreshnessTracker {
    last_checked: LastChecked,
    timezone: Tz,
}

impl FreshnessTracker {
    /// Create a tracker for the server zone
    ///
    /// `last_checked` may carry any offset; it is converted into `timezone`.
    pub fn new<O: TimeZone>(last_checked: Option<DateTime<O>>, timezone: Tz) -> Self {
        let last_checked = match last_checked {
            Some(stamp) => LastChecked::At(stamp.with_timezone(&timezone)),
            None => LastChecked::Never,
        };
        Self {
            last_checked,
            timezone,
        }
    }

    pub fn last_checked(&self) -> LastChecked {
        self.last_checked
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Attach the server zone to a raw listing
    ///
    /// A stamp inside a DST gap does not exist and is rejected. A stamp in a
    /// DST fold resolves to the earlier instant.
    pub fn localize(&self, filename: &str, raw: RawPathInfo) -> SyncResult<RemoteFileInfo> {
        let modify = match self.timezone.from_local_datetime(&raw.modify) {
            LocalResult::Single(stamp) => stamp,
            LocalResult::Ambiguous(earliest, _) => earliest,
            LocalResult::None => {
                return Err(SyncError::Timestamp {
                    filename: filename.to_string(),
                    value: raw.modify.to_string(),
                    reason: format!("does not exist in {}", self.timezone),
                })
            }
        };

        Ok(RemoteFileInfo {
            kind: raw.kind,
            size: raw.size,
            modify,
        })
    }

    /// Whether the remote copy changed after the last check
    pub fn is_newer(&self, info: &RemoteFileInfo) -> bool {
        match self.last_checked {
            LastChecked::Never => true,
            LastChecked::At(checked) => info.modify > checked,
        }
    }

    /// Decide whether a file has to be fetched
    pub fn decide(&self, info: &RemoteFileInfo, local_exists: bool) -> Freshness {
        if !local_exists {
            Freshness::Missing
        } else if self.is_newer(info) {
            Freshness::Outdated
        } else {
            Freshness::UpToDate
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::EntryKind;
    use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
    use chrono_tz::Europe::Zurich;
    use proptest::prelude::*;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn raw(modify: NaiveDateTime) -> RawPathInfo {
        RawPathInfo {
            kind: EntryKind::File,
            size: 120_000,
            modify,
        }
    }

    fn tracker_at(last: NaiveDateTime) -> FreshnessTracker {
        FreshnessTracker::new(Some(Zurich.from_local_datetime(&last).unwrap()), Zurich)
    }

    #[test]
    fn test_first_run_always_refreshes() {
        let tracker = FreshnessTracker::new(None::<DateTime<Utc>>, Zurich);
        let info = tracker
            .localize("chem_prop.tsv", raw(naive(1999, 1, 1, 0, 0)))
            .unwrap();
        assert!(tracker.is_newer(&info));
        assert_eq!(tracker.decide(&info, true), Freshness::Outdated);
    }

    #[test]
    fn test_remote_change_after_last_check() {
        let tracker = tracker_at(naive(2021, 4, 1, 0, 0));
        let info = tracker
            .localize("chem_prop.tsv", raw(naive(2021, 5, 1, 10, 0)))
            .unwrap();
        assert_eq!(tracker.decide(&info, true), Freshness::Outdated);
        assert!(tracker.decide(&info, true).needs_refresh());
    }

    #[test]
    fn test_unchanged_remote_is_up_to_date() {
        let tracker = tracker_at(naive(2021, 6, 1, 0, 0));
        let info = tracker
            .localize("chem_prop.tsv", raw(naive(2021, 5, 1, 10, 0)))
            .unwrap();
        assert_eq!(tracker.decide(&info, true), Freshness::UpToDate);
        assert!(!tracker.decide(&info, true).needs_refresh());
    }

    #[test]
    fn test_equal_stamp_is_up_to_date() {
        let stamp = naive(2021, 5, 1, 10, 0);
        let tracker = tracker_at(stamp);
        let info = tracker.localize("chem_prop.tsv", raw(stamp)).unwrap();
        assert_eq!(tracker.decide(&info, true), Freshness::UpToDate);
    }

    #[test]
    fn test_missing_local_copy_wins() {
        let tracker = tracker_at(naive(2021, 6, 1, 0, 0));
        let info = tracker
            .localize("chem_prop.tsv", raw(naive(2021, 5, 1, 10, 0)))
            .unwrap();
        assert_eq!(tracker.decide(&info, false), Freshness::Missing);
    }

    #[test]
    fn test_last_checked_offset_is_converted() {
        // 08:30 UTC is 10:30 in Zurich during summer time
        let last = Utc.with_ymd_and_hms(2021, 5, 1, 8, 30, 0).unwrap();
        let tracker = FreshnessTracker::new(Some(last), Zurich);

        let before = tracker
            .localize("a.tsv", raw(naive(2021, 5, 1, 10, 15)))
            .unwrap();
        let after = tracker
            .localize("a.tsv", raw(naive(2021, 5, 1, 10, 45)))
            .unwrap();
        assert!(!tracker.is_newer(&before));
        assert!(tracker.is_newer(&after));
    }

    #[test]
    fn test_dst_gap_is_rejected() {
        let tracker = FreshnessTracker::new(None::<DateTime<Utc>>, Zurich);
        // Clocks jump from 02:00 to 03:00 on the last Sunday of March
        let err = tracker
            .localize("chem_prop.tsv", raw(naive(2021, 3, 28, 2, 30)))
            .unwrap_err();
        assert!(matches!(err, SyncError::Timestamp { filename, .. } if filename == "chem_prop.tsv"));
    }

    #[test]
    fn test_dst_fold_takes_earliest() {
        let tracker = FreshnessTracker::new(None::<DateTime<Utc>>, Zurich);
        // 02:30 happens twice on the last Sunday of October
        let info = tracker
            .localize("chem_prop.tsv", raw(naive(2021, 10, 31, 2, 30)))
            .unwrap();
        let utc = info.modify.with_timezone(&Utc);
        assert_eq!(utc, Utc.with_ymd_and_hms(2021, 10, 31, 0, 30, 0).unwrap());
    }

    proptest! {
        #[test]
        fn prop_missing_always_refreshes(offset_minutes in -100_000i64..100_000) {
            let last = naive(2021, 6, 1, 0, 0);
            let tracker = tracker_at(last);
            let modify = Zurich.from_local_datetime(&last).unwrap() + Duration::minutes(offset_minutes);
            let info = RemoteFileInfo { kind: EntryKind::File, size: 1, modify };
            prop_assert_eq!(tracker.decide(&info, false), Freshness::Missing);
        }

        #[test]
        fn prop_refresh_iff_strictly_newer(offset_minutes in -100_000i64..100_000) {
            let last = naive(2021, 6, 1, 0, 0);
            let tracker = tracker_at(last);
            let modify = Zurich.from_local_datetime(&last).unwrap() + Duration::minutes(offset_minutes);
            let info = RemoteFileInfo { kind: EntryKind::File, size: 1, modify };
            prop_assert_eq!(tracker.decide(&info, true).needs_refresh(), offset_minutes > 0);
        }
    }
}
