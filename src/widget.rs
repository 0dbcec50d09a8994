//! The seam between the renderer and a concrete map widget.

use crate::config::MapConfig;
use crate::error::WidgetError;
use crate::layer::{LayerSpec, SourceSpec};
use geo::{coord, Rect};
use geojson::JsonValue;
use std::fs;
use std::path::Path;

/// Base map style, treated as an opaque JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDocument(JsonValue);

impl StyleDocument {
    pub fn new(value: JsonValue) -> Self {
        Self(value)
    }

    pub fn load(path: &Path) -> Result<Self, WidgetError> {
        let content = fs::read_to_string(path).map_err(|source| WidgetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(serde_json::from_str(&content)?))
    }

    pub fn as_json(&self) -> &JsonValue {
        &self.0
    }

    /// A usable style is an object with a numeric `version`.
    pub fn validate(&self) -> Result<(), WidgetError> {
        let object = self.0.as_object()
            .ok_or_else(|| WidgetError::InvalidStyle("style must be a JSON object".to_string()))?;
        match object.get("version") {
            Some(v) if v.is_number() => Ok(()),
            _ => Err(WidgetError::InvalidStyle("missing numeric `version`".to_string())),
        }
    }

    /// `paint.background-color` of the first `background` layer, if any.
    pub fn background_color(&self) -> Option<&str> {
        self.0.get("layers")?
            .as_array()?
            .iter()
            .find(|layer| layer.get("type").and_then(JsonValue::as_str) == Some("background"))?
            .get("paint")?
            .get("background-color")?
            .as_str()
    }
}

/// Everything a widget needs at construction time.
#[derive(Debug, Clone)]
pub struct MapOptions {
    pub container: String,
    pub style: StyleDocument,
    /// West/south in `min`, east/north in `max`.
    pub max_bounds: Rect<f64>,
    pub access_token: Option<String>,
}

impl MapOptions {
    pub fn from_config(map: &MapConfig, style: StyleDocument) -> Self {
        let [[west, south], [east, north]] = map.max_bounds;
        Self {
            container: map.container.clone(),
            style,
            max_bounds: Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north }),
            access_token: map.access_token.clone(),
        }
    }

    /// Checks the parts of the options every widget depends on.
    pub fn validate(&self) -> Result<(), WidgetError> {
        let valid_id = !self.container.is_empty()
            && self.container.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_id {
            return Err(WidgetError::InvalidContainer(self.container.clone()));
        }
        self.style.validate()
    }
}

/// A live map instance.
pub trait MapWidget {
    /// Reports the widget's load event. Returns `true` exactly once.
    fn poll_load(&mut self) -> bool;

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), WidgetError>;

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), WidgetError>;

    /// Releases the instance.
    fn remove(self);
}

/// Builds widgets bound to a container.
pub trait MapBackend {
    type Widget: MapWidget;

    fn construct(&mut self, options: &MapOptions) -> Result<Self::Widget, WidgetError>;
}

/// Sources and layers registered on a widget, in registration order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sources: Vec<(String, SourceSpec)>,
    layers: Vec<LayerSpec>,
}

impl Registry {
    pub fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), WidgetError> {
        if self.source(id).is_some() {
            return Err(WidgetError::DuplicateSource(id.to_string()));
        }
        self.sources.push((id.to_string(), source));
        Ok(())
    }

    pub fn add_layer(&mut self, layer: LayerSpec) -> Result<(), WidgetError> {
        if self.layers.iter().any(|l| l.id == layer.id) {
            return Err(WidgetError::DuplicateLayer(layer.id));
        }
        if self.source(&layer.source).is_none() {
            return Err(WidgetError::UnknownSource {
                layer: layer.id,
                source_id: layer.source,
            });
        }
        self.layers.push(layer);
        Ok(())
    }

    pub fn source(&self, id: &str) -> Option<&SourceSpec> {
        self.sources.iter().find(|(sid, _)| sid == id).map(|(_, s)| s)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourceSpec)> {
        self.sources.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }
}
