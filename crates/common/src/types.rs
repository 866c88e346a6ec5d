use serde::{Deserialize, Serialize};

/// Identifier of an observation.
///
/// Identifiers are database-assigned and strictly positive; a non-positive
/// value can still be constructed (it usually comes straight from a request)
/// and is rejected by [`ObservationId::is_valid`] before any store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationId(i64);

impl ObservationId {
    /// Creates an observation ID from a raw value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true if the identifier can refer to a stored row.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for ObservationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ObservationId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Identifier of a user (creator or moderator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user ID from a raw value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true if the identifier can refer to a stored row.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Identifier of a referenced event (an observation day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayId(i64);

impl DayId {
    /// Creates a day ID from a raw value.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns true if the identifier can refer to a stored row.
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for DayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DayId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// Equatorial coordinates in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Right ascension, `0..=360` degrees.
    pub ra: f64,

    /// Declination, `-90..=90` degrees.
    pub dec: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    pub const fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Returns true if both components are finite and within range.
    pub fn is_valid(&self) -> bool {
        self.ra.is_finite()
            && self.dec.is_finite()
            && (0.0..=360.0).contains(&self.ra)
            && (-90.0..=90.0).contains(&self.dec)
    }

    /// Returns `(ra, dec)` converted to radians.
    pub fn to_radians(&self) -> (f64, f64) {
        (self.ra.to_radians(), self.dec.to_radians())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_reject_non_positive_values() {
        assert!(ObservationId::new(1).is_valid());
        assert!(!ObservationId::new(0).is_valid());
        assert!(!UserId::new(-3).is_valid());
        assert!(!DayId::new(0).is_valid());
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ObservationId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let day: DayId = serde_json::from_str("7").unwrap();
        assert_eq!(day, DayId::new(7));
    }

    #[test]
    fn coordinates_range_check() {
        assert!(Coordinates::new(133.5752, 22.4028).is_valid());
        assert!(Coordinates::new(0.0, -90.0).is_valid());
        assert!(!Coordinates::new(361.0, 0.0).is_valid());
        assert!(!Coordinates::new(10.0, 90.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }
}
