//! Source and layer descriptions handed to a map widget.
//!
//! These serialize to the JSON shapes mapbox-gl's `addSource` / `addLayer` accept.

use geojson::{FeatureCollection, JsonObject, JsonValue};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SourceSpec {
    #[serde(rename = "geojson")]
    GeoJson { data: FeatureCollection },
}

impl SourceSpec {
    pub fn features(&self) -> &FeatureCollection {
        match self {
            SourceSpec::GeoJson { data } => data,
        }
    }
}

/// A paint value: either a feature property lookup or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Get(String),
    Literal(JsonValue),
}

impl Expression {
    pub fn get(property: &str) -> Self {
        Expression::Get(property.to_string())
    }

    /// Evaluates against one feature's properties.
    pub fn evaluate<'a>(&'a self, properties: Option<&'a JsonObject>) -> Option<&'a JsonValue> {
        match self {
            Expression::Get(key) => properties.and_then(|props| props.get(key)),
            Expression::Literal(value) => Some(value),
        }
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expression::Get(key) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element("get")?;
                seq.serialize_element(key)?;
                seq.end()
            }
            Expression::Literal(value) => value.serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CirclePaint {
    #[serde(rename = "circle-radius")]
    pub radius: Expression,
    #[serde(rename = "circle-color")]
    pub color: Expression,
    #[serde(rename = "circle-opacity")]
    pub opacity: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    pub paint: CirclePaint,
}

impl LayerSpec {
    /// Circle layer reading `radius` and `color` from each feature.
    pub fn styled_circles(id: &str, source: &str, opacity: f64) -> Self {
        Self {
            id: id.to_string(),
            kind: LayerKind::Circle,
            source: source.to_string(),
            paint: CirclePaint {
                radius: Expression::get("radius"),
                color: Expression::get("color"),
                opacity: Expression::Literal(JsonValue::from(opacity)),
            },
        }
    }
}
