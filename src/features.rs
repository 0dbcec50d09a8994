use crate::types::{PointCollection, StyledPoint};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};

/// Projects the styled points into a GeoJSON `FeatureCollection`.
///
/// Each point becomes a `Point` feature at `[longitude, latitude]` with
/// `name`, `radius` and `color` properties.
pub fn to_feature_collection(points: &PointCollection) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: points.iter().map(point_feature).collect(),
        foreign_members: None,
    }
}

fn point_feature(point: &StyledPoint) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), JsonValue::from(point.name.clone()));
    properties.insert("radius".to_string(), JsonValue::from(point.radius));
    properties.insert("color".to_string(), JsonValue::from(point.color.clone()));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::from(&point.location()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn features_carry_style_properties() {
        let points = PointCollection::new(vec![StyledPoint {
            name: "A".into(),
            latitude: 10.0,
            longitude: 20.0,
            radius: 1.2,
            color: "#A221B9".into(),
        }]);

        let collection = to_feature_collection(&points);
        let json = serde_json::to_value(&collection).unwrap();

        assert_eq!(
            json,
            json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [20.0, 10.0] },
                    "properties": { "name": "A", "radius": 1.2, "color": "#A221B9" }
                }]
            })
        );
    }

    #[test]
    fn empty_collection_has_no_features() {
        let collection = to_feature_collection(&PointCollection::default());
        assert!(collection.features.is_empty());
    }
}
