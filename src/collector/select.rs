use std::cmp::Ordering;

use super::{Constraints, SortKey};
use crate::provider::VideoDescriptor;

/// Filter, sort and truncate candidates according to `constraints`.
///
/// Sorting is stable, so videos that tie on both keys keep their listing order.
pub fn select(videos: Vec<VideoDescriptor>, constraints: &Constraints) -> Vec<VideoDescriptor> {
    let mut selected: Vec<VideoDescriptor> = videos
        .into_iter()
        .filter(|video| matches(video, constraints))
        .collect();

    selected.sort_by(|a, b| compare(a, b, constraints.sort_key));
    selected.truncate(constraints.max_count);
    selected
}

fn matches(video: &VideoDescriptor, constraints: &Constraints) -> bool {
    if let Some(min) = constraints.min_duration_seconds {
        if video.duration_seconds < min {
            return false;
        }
    }

    if let Some(max) = constraints.max_duration_seconds {
        if video.duration_seconds > max {
            return false;
        }
    }

    if let Some(min_views) = constraints.min_views {
        if video.view_count < min_views {
            return false;
        }
    }

    true
}

/// Descending order on the primary key, then the secondary one.
/// A missing upload date sorts after every known date. Two undated videos
/// keep their listing order under a date sort, since channels list newest first.
fn compare(a: &VideoDescriptor, b: &VideoDescriptor, key: SortKey) -> Ordering {
    let by_views = b.view_count.cmp(&a.view_count);
    let by_date = b.upload_date.cmp(&a.upload_date);

    match key {
        SortKey::Views => by_views.then(by_date),
        SortKey::Date if a.upload_date.is_none() && b.upload_date.is_none() => Ordering::Equal,
        SortKey::Date => by_date.then(by_views),
    }
}
