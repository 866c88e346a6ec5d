//! Distance estimation from angular displacement across dated positions.
//!
//! The tracked object is assumed to move at a fixed linear speed
//! ([`LINEAR_SPEED_M_PER_S`]). For every ordered pair of positions the
//! distance that would produce the observed angular separation in the
//! elapsed time is `speed · dt / alpha`; the estimate is the median over
//! all pairs.

use chrono::NaiveDate;
use common::Coordinates;
use store::ItemWithEvent;

/// Assumed linear speed of the tracked object, metres per second.
pub const LINEAR_SPEED_M_PER_S: f64 = 25_000.0;

const METRES_PER_KM: f64 = 1_000.0;

/// A position on the sky at a calendar date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatedPoint {
    pub coordinates: Coordinates,
    pub date: NaiveDate,
}

impl DatedPoint {
    pub fn new(coordinates: Coordinates, date: NaiveDate) -> Self {
        Self { coordinates, date }
    }
}

/// Parses a day label as `dd.mm.yyyy`, falling back to ISO `yyyy-mm-dd`.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(label, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(label, "%Y-%m-%d"))
        .ok()
}

/// Builds dated points from items, using each item's effective coordinates.
///
/// Items whose day label does not parse are dropped.
pub fn dated_points(rows: &[ItemWithEvent]) -> Vec<DatedPoint> {
    rows.iter()
        .filter_map(|row| match parse_date_label(&row.event.date_label) {
            Some(date) => Some(DatedPoint::new(row.effective_coordinates(), date)),
            None => {
                tracing::debug!(
                    day_id = %row.event.id,
                    label = %row.event.date_label,
                    "skipping item with unparsable date label"
                );
                None
            }
        })
        .collect()
}

/// Great-circle separation between two positions, in radians (haversine).
pub fn angular_separation(a: Coordinates, b: Coordinates) -> f64 {
    let (ra1, dec1) = a.to_radians();
    let (ra2, dec2) = b.to_radians();
    let d_ra = ra2 - ra1;
    let d_dec = dec2 - dec1;

    let h = (d_dec / 2.0).sin().powi(2) + dec1.cos() * dec2.cos() * (d_ra / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Per-pair distance candidates in kilometres.
///
/// Points are ordered by date first. Pairs with no elapsed time or no
/// angular separation contribute nothing, as do non-finite results.
pub fn candidate_distances(points: &[DatedPoint]) -> Vec<f64> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.date);

    let mut candidates = Vec::with_capacity(sorted.len() * sorted.len().saturating_sub(1) / 2);
    for (i, earlier) in sorted.iter().enumerate() {
        for later in &sorted[i + 1..] {
            let dt = (later.date - earlier.date).num_seconds() as f64;
            if dt <= 0.0 {
                continue;
            }
            let alpha = angular_separation(earlier.coordinates, later.coordinates);
            if !(alpha.is_finite() && alpha > 0.0) {
                continue;
            }
            let km = LINEAR_SPEED_M_PER_S * dt / alpha / METRES_PER_KM;
            if km.is_finite() && km > 0.0 {
                candidates.push(km);
            }
        }
    }
    candidates
}

/// Median of `values`; the mean of the two middle values for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let count = sorted.len();
    Some(if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    })
}

/// Estimated distance in kilometres; `0` when fewer than two dated points
/// or no usable pair exist. Never fails.
pub fn estimate_distance_km(points: &[DatedPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    median(&candidate_distances(points)).unwrap_or(0.0)
}
