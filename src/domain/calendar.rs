//! Calendar day buckets keyed on each post's display timestamp

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone};

use crate::models::PersistedPost;

fn local_date<Tz: TimeZone>(post: &PersistedPost, tz: &Tz) -> Option<NaiveDate> {
    post.display_timestamp()
        .map(|ts| ts.with_timezone(tz).date_naive())
}

fn newest_first(posts: &mut [&PersistedPost]) {
    posts.sort_by(|a, b| b.display_timestamp().cmp(&a.display_timestamp()));
}

/// Posts of one month keyed by day of month. Content plays no part.
pub fn bucket_by_day<'a, Tz: TimeZone>(
    posts: &'a [PersistedPost],
    year: i32,
    month: u32,
    tz: &Tz,
) -> BTreeMap<u32, Vec<&'a PersistedPost>> {
    let mut days: BTreeMap<u32, Vec<&PersistedPost>> = BTreeMap::new();

    for post in posts {
        if let Some(date) = local_date(post, tz)
            && date.year() == year
            && date.month() == month
        {
            days.entry(date.day()).or_default().push(post);
        }
    }

    for bucket in days.values_mut() {
        newest_first(bucket);
    }
    days
}

/// Posts falling on `date` in `tz`, newest first
pub fn posts_on_day<'a, Tz: TimeZone>(
    posts: &'a [PersistedPost],
    date: NaiveDate,
    tz: &Tz,
) -> Vec<&'a PersistedPost> {
    let mut day: Vec<_> = posts
        .iter()
        .filter(|p| local_date(p, tz) == Some(date))
        .collect();
    newest_first(&mut day);
    day
}

pub fn posts_today<'a, Tz: TimeZone>(
    posts: &'a [PersistedPost],
    now: &DateTime<Tz>,
) -> Vec<&'a PersistedPost> {
    posts_on_day(posts, now.date_naive(), &now.timezone())
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;
    use crate::models::parse_timestamp;
    use crate::test_support::post;

    fn ids(posts: &[&PersistedPost]) -> Vec<i64> {
        posts.iter().map(|p| p.id).collect()
    }

    #[test]
    fn scheduled_at_wins_over_published_and_created() {
        let mut p = post(1, "Sale", "2024-05-01T08:00:00Z");
        p.published_at = parse_timestamp("2024-05-02T08:00:00Z");
        p.scheduled_at = parse_timestamp("2024-05-20T08:00:00Z");
        let posts = vec![p];

        let days = bucket_by_day(&posts, 2024, 5, &Utc);
        assert_eq!(days.keys().copied().collect::<Vec<_>>(), vec![20]);
    }

    #[test]
    fn scheduled_at_is_the_same_day_sort_key() {
        let mut rescheduled = post(1, "Rescheduled", "2024-05-04T08:00:00Z");
        rescheduled.published_at = parse_timestamp("2024-05-04T20:00:00Z");
        rescheduled.scheduled_at = parse_timestamp("2024-05-04T09:00:00Z");
        let posts = vec![rescheduled, post(2, "Plain", "2024-05-04T12:00:00Z")];
        let day = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();

        assert_eq!(ids(&posts_on_day(&posts, day, &Utc)), vec![2, 1]);
        assert_eq!(ids(&bucket_by_day(&posts, 2024, 5, &Utc)[&4]), vec![2, 1]);
    }

    #[test]
    fn published_at_wins_over_created_at() {
        let mut p = post(1, "Sale", "2024-05-01T08:00:00Z");
        p.published_at = parse_timestamp("2024-05-03T08:00:00Z");
        let posts = vec![p];

        let days = bucket_by_day(&posts, 2024, 5, &Utc);
        assert!(days.contains_key(&3));
    }

    #[test]
    fn buckets_ignore_content_and_sort_newest_first() {
        let posts = vec![
            post(1, "Morning", "2024-05-04T08:00:00Z"),
            post(2, "Evening", "2024-05-04T19:00:00Z"),
            post(3, "Morning", "2024-05-04T12:00:00Z"),
            post(4, "Next month", "2024-06-01T08:00:00Z"),
        ];

        let days = bucket_by_day(&posts, 2024, 5, &Utc);
        assert_eq!(days.len(), 1);
        assert_eq!(ids(&days[&4]), vec![2, 3, 1]);
    }

    #[test]
    fn timezone_moves_posts_across_midnight() {
        let posts = vec![post(1, "Late", "2024-05-04T23:30:00Z")];
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

        assert!(bucket_by_day(&posts, 2024, 5, &Utc).contains_key(&4));
        assert!(bucket_by_day(&posts, 2024, 5, &tokyo).contains_key(&5));
    }

    #[test]
    fn posts_without_timestamps_are_left_out() {
        let mut undated = post(1, "Draft", "");
        undated.created_at = None;
        let posts = vec![undated];

        assert!(bucket_by_day(&posts, 2024, 5, &Utc).is_empty());
        let day = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();
        assert!(posts_on_day(&posts, day, &Utc).is_empty());
    }

    #[test]
    fn today_and_selected_day_share_ordering() {
        let posts = vec![
            post(1, "A", "2024-05-04T08:00:00Z"),
            post(2, "B", "2024-05-04T10:00:00Z"),
            post(3, "C", "2024-05-05T10:00:00Z"),
        ];
        let now = parse_timestamp("2024-05-04T21:00:00Z").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();

        assert_eq!(ids(&posts_today(&posts, &now)), vec![2, 1]);
        assert_eq!(ids(&posts_on_day(&posts, day, &Utc)), vec![2, 1]);
    }
}
