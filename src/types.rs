use geo::Point;
use serde::{Deserialize, Serialize};

/// A city record as delivered by the data endpoint.
///
/// Every field is optional so that incomplete records can be reported and
/// skipped instead of leaking NaN into the styling.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawCityRecord {
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    #[serde(rename = "dataPoint")]
    pub data_point: Option<f64>,
}

/// A display-ready point derived from one [`RawCityRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
    pub color: String,
}

impl StyledPoint {
    /// Location as an x = longitude, y = latitude point.
    pub fn location(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// The current set of styled points. Replaced wholesale on every load.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCollection {
    points: Vec<StyledPoint>,
}

impl PointCollection {
    pub fn new(points: Vec<StyledPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StyledPoint> {
        self.points.iter()
    }
}

impl From<Vec<StyledPoint>> for PointCollection {
    fn from(points: Vec<StyledPoint>) -> Self {
        Self::new(points)
    }
}

impl<'a> IntoIterator for &'a PointCollection {
    type Item = &'a StyledPoint;
    type IntoIter = std::slice::Iter<'a, StyledPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
