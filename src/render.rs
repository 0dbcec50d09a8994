use crate::error::WidgetError;
use crate::layer::{LayerSpec, SourceSpec};
use crate::widget::{MapBackend, MapOptions, MapWidget, Registry};
use geo::{Intersects, Point, Rect};
use geojson::JsonValue;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::f64::consts::PI;
use std::path::Path;
use tracing::{debug, warn};

// Web Mercator is undefined past this latitude
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;
const DEFAULT_BACKGROUND: Rgba<u8> = Rgba([242, 239, 233, 255]);

/// Builds [`HeadlessMap`]s that rasterize into an image instead of a browser.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    pub width: u32,
    pub height: u32,
    pub point_scale: f64,
}

impl MapBackend for HeadlessBackend {
    type Widget = HeadlessMap;

    fn construct(&mut self, options: &MapOptions) -> Result<HeadlessMap, WidgetError> {
        options.validate()?;
        if self.width == 0 || self.height == 0 {
            return Err(WidgetError::InvalidContainer(format!(
                "{} ({}x{})",
                options.container, self.width, self.height
            )));
        }

        let background = options.style.background_color()
            .and_then(hex_to_rgba)
            .unwrap_or(DEFAULT_BACKGROUND);

        Ok(HeadlessMap {
            width: self.width,
            height: self.height,
            point_scale: self.point_scale,
            bounds: options.max_bounds,
            background,
            registry: Registry::default(),
            load_reported: false,
        })
    }
}

impl HeadlessBackend {
    /// Writes the style background with nothing drawn on it.
    pub fn save_blank_png(&mut self, options: &MapOptions, path: &Path) -> Result<(), WidgetError> {
        let map = self.construct(options)?;
        let saved = map.save_png(path);
        map.remove();
        saved
    }
}

/// An in-memory map. Loads as soon as it is constructed.
#[derive(Debug)]
pub struct HeadlessMap {
    width: u32,
    height: u32,
    point_scale: f64,
    bounds: Rect<f64>,
    background: Rgba<u8>,
    registry: Registry,
    load_reported: bool,
}

impl MapWidget for HeadlessMap {
    fn poll_load(&mut self) -> bool {
        !std::mem::replace(&mut self.load_reported, true)
    }

    fn add_source(&mut self, id: &str, source: SourceSpec) -> Result<(), WidgetError> {
        self.registry.add_source(id, source)
    }

    fn add_layer(&mut self, layer: LayerSpec) -> Result<(), WidgetError> {
        self.registry.add_layer(layer)
    }

    fn remove(self) {
        debug!(layers = self.registry.layers().len(), "Headless map released");
    }
}

impl HeadlessMap {
    /// Draws every circle layer over the style background.
    pub fn snapshot(&self) -> RgbaImage {
        let mut img: RgbaImage = ImageBuffer::from_pixel(self.width, self.height, self.background);

        for layer in self.registry.layers() {
            let Some(source) = self.registry.source(&layer.source) else { continue };
            self.draw_circles(&mut img, layer, source);
        }

        img
    }

    pub fn save_png(&self, path: &Path) -> Result<(), WidgetError> {
        self.snapshot().save(path)?;
        Ok(())
    }

    fn draw_circles(&self, img: &mut RgbaImage, layer: &LayerSpec, source: &SourceSpec) {
        let opacity = layer.paint.opacity.evaluate(None)
            .and_then(JsonValue::as_f64)
            .unwrap_or(1.0)
            .clamp(0.0, 1.0);

        for feature in &source.features().features {
            let Some(geojson::Value::Point(coords)) = feature.geometry.as_ref().map(|g| &g.value) else {
                continue;
            };
            if coords.len() < 2 {
                continue;
            }
            let location = Point::new(coords[0], coords[1]);
            if !location.intersects(&self.bounds) {
                continue;
            }

            let props = feature.properties.as_ref();
            let radius = layer.paint.radius.evaluate(props).and_then(JsonValue::as_f64);
            let color = layer.paint.color.evaluate(props).and_then(JsonValue::as_str).and_then(hex_to_rgba);
            let (Some(radius), Some(color)) = (radius, color) else {
                warn!(layer = %layer.id, "Feature without usable radius/color, skipped");
                continue;
            };

            let (px, py) = self.project(location);
            fill_circle(img, px, py, (radius * self.point_scale).max(1.0), color, opacity);
        }
    }

    /// Pixel position of a lon/lat point with the view fitted to the bounds.
    fn project(&self, location: Point<f64>) -> (f64, f64) {
        let (min_x, min_y) = world_xy(self.bounds.min().x, self.bounds.max().y);
        let (max_x, max_y) = world_xy(self.bounds.max().x, self.bounds.min().y);
        let (x, y) = world_xy(location.x(), location.y());

        let px = (x - min_x) / (max_x - min_x) * self.width as f64;
        let py = (y - min_y) / (max_y - min_y) * self.height as f64;
        (px, py)
    }
}

// Normalized Web Mercator, (0, 0) at the north-west corner of the world
fn world_xy(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0;
    (x, y)
}

fn fill_circle(img: &mut RgbaImage, cx: f64, cy: f64, radius: f64, color: Rgba<u8>, opacity: f64) {
    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(img.width());
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(img.height());

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                blend(img.get_pixel_mut(x, y), color, opacity);
            }
        }
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f64) {
    for i in 0..3 {
        let mixed = src.0[i] as f64 * alpha + dst.0[i] as f64 * (1.0 - alpha);
        dst.0[i] = mixed.round() as u8;
    }
    dst.0[3] = 255;
}

/// Parses `#RRGGBB`.
fn hex_to_rgba(hex: &str) -> Option<Rgba<u8>> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgba([r, g, b, 255]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::features::to_feature_collection;
    use crate::types::{PointCollection, StyledPoint};
    use crate::widget::StyleDocument;
    use image::GenericImageView;
    use serde_json::json;

    fn backend() -> HeadlessBackend {
        HeadlessBackend {
            width: 200,
            height: 100,
            point_scale: 5.0,
        }
    }

    fn options() -> MapOptions {
        let style = StyleDocument::new(json!({
            "version": 8,
            "layers": [{"id": "bg", "type": "background", "paint": {"background-color": "#000000"}}]
        }));
        MapOptions::from_config(&MapConfig::default(), style)
    }

    fn point(lat: f64, lon: f64, color: &str) -> StyledPoint {
        StyledPoint {
            name: "p".into(),
            latitude: lat,
            longitude: lon,
            radius: 1.6,
            color: color.into(),
        }
    }

    fn map_with(points: Vec<StyledPoint>, opacity: f64) -> HeadlessMap {
        let mut map = backend().construct(&options()).unwrap();
        let data = to_feature_collection(&PointCollection::new(points));
        map.add_source("dataPoints", SourceSpec::GeoJson { data }).unwrap();
        map.add_layer(LayerSpec::styled_circles("circle-layer", "dataPoints", opacity)).unwrap();
        map
    }

    #[test]
    fn loads_once() {
        let mut map = backend().construct(&options()).unwrap();
        assert!(map.poll_load());
        assert!(!map.poll_load());
    }

    #[test]
    fn rejects_invalid_options() {
        let mut bad = options();
        bad.container = String::new();
        assert!(matches!(backend().construct(&bad), Err(WidgetError::InvalidContainer(_))));

        let mut zero = backend();
        zero.width = 0;
        assert!(zero.construct(&options()).is_err());
    }

    #[test]
    fn background_comes_from_style() {
        let img = map_with(vec![], 0.7).snapshot();
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn circle_is_blended_at_opacity() {
        // center of the bounds' longitude span, on the equator
        let map = map_with(vec![point(0.0, 0.0, "#FFFFFF")], 0.5);
        let (px, py) = map.project(Point::new(0.0, 0.0));
        let img = map.snapshot();

        assert!((px - 100.0).abs() < 1e-9);
        let pixel = img.get_pixel(px as u32, py as u32);
        assert_eq!(*pixel, Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn out_of_bounds_points_are_skipped() {
        let img = map_with(vec![point(80.0, 0.0, "#FFFFFF")], 1.0).snapshot();
        assert!(img.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn north_is_up() {
        let map = map_with(vec![], 1.0);
        let (_, north) = map.project(Point::new(0.0, 60.0));
        let (_, south) = map.project(Point::new(0.0, -40.0));
        assert!(north < south);
        assert!(north >= 0.0 && south <= 100.0);
    }

    #[test]
    fn saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        map_with(vec![point(48.85, 2.35, "#E8AD85")], 0.7).save_png(&path).unwrap();
        let reloaded = image::open(&path).unwrap();
        assert_eq!((reloaded.width(), reloaded.height()), (200, 100));
    }

    #[test]
    fn blank_png_is_background_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.png");
        backend().save_blank_png(&options(), &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded.dimensions(), (200, 100));
        assert!(reloaded.pixels().all(|p| *p == Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(hex_to_rgba("#8F1CCD"), Some(Rgba([0x8F, 0x1C, 0xCD, 255])));
        assert_eq!(hex_to_rgba("8F1CCD"), None);
        assert_eq!(hex_to_rgba("#8F1"), None);
        assert_eq!(hex_to_rgba("#ZZZZZZ"), None);
    }
}
