//! A widget that writes a standalone mapbox-gl page.
//!
//! The page constructs the map from the recorded options and replays every
//! `addSource` / `addLayer` call in the browser's `load` handler.

use crate::error::WidgetError;
use crate::layer::{LayerSpec, SourceSpec};
use crate::widget::{MapBackend, MapOptions, MapWidget, Registry};
use geojson::JsonValue;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

const PAGE_TEMPLATE: &str = include_str!("../assets/page.html");

#[derive(Debug, Clone, Default)]
pub struct HtmlBackend;

impl MapBackend for HtmlBackend {
    type Widget = HtmlMap;

    fn construct(&mut self, options: &MapOptions) -> Result<HtmlMap, WidgetError> {
        options.validate()?;
        if options.access_token.is_none() {
            warn!("No map access token configured, the page will not load tiles");
        }

        Ok(HtmlMap {
            options: options.clone(),
            registry: Registry::default(),
            load_reported: false,
        })
    }
}

#[derive(Debug)]
pub struct HtmlMap {
    options: MapOptions,
    registry: Registry,
    load_reported: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageSetup<'a> {
    access_token: &'a str,
    container: &'a str,
    style: &'a JsonValue,
    max_bounds: [[f64; 2]; 2],
    sources: Vec<PageSource<'a>>,
    layers: &'a [LayerSpec],
}

#[derive(Serialize)]
struct PageSource<'a> {
    id: &'a str,
    spec: &'a SourceSpec,
}

impl MapWidget for HtmlMap {
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
        debug!(container = %self.options.container, "Page map released");
    }
}

impl HtmlMap {
    pub fn render_page(&self) -> Result<String, WidgetError> {
        let sources = self.registry.sources()
            .map(|(id, spec)| PageSource { id, spec })
            .collect();
        render_page(&self.options, sources, self.registry.layers(), None)
    }

    pub fn write_page(&self, path: &Path) -> Result<(), WidgetError> {
        write_file(path, self.render_page()?)
    }
}

/// Writes a page showing only the base map and `message`, for when there is
/// nothing to put on it.
pub fn write_status_page(options: &MapOptions, message: &str, path: &Path) -> Result<(), WidgetError> {
    options.validate()?;
    write_file(path, render_page(options, Vec::new(), &[], Some(message))?)
}

fn render_page(
    options: &MapOptions,
    sources: Vec<PageSource<'_>>,
    layers: &[LayerSpec],
    status: Option<&str>,
) -> Result<String, WidgetError> {
    let bounds = options.max_bounds;
    let setup = PageSetup {
        access_token: options.access_token.as_deref().unwrap_or(""),
        container: &options.container,
        style: options.style.as_json(),
        max_bounds: [
            [bounds.min().x, bounds.min().y],
            [bounds.max().x, bounds.max().y],
        ],
        sources,
        layers,
    };

    // `<` only appears inside JSON strings, where \u003c is equivalent and can't
    // open or close markup inside the script element
    let setup_json = serde_json::to_string(&setup)?.replace('<', "\\u003c");

    let status_html = match status {
        Some(message) => format!(r#"<div class="map-status" role="status">{}</div>"#, escape_html(message)),
        None => String::new(),
    };

    Ok(PAGE_TEMPLATE
        .replace("{{CONTAINER}}", &options.container)
        .replace("{{STATUS}}", &status_html)
        .replace("{{SETUP}}", &setup_json))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn write_file(path: &Path, page: String) -> Result<(), WidgetError> {
    fs::write(path, page).map_err(|source| WidgetError::Io {
        path: path.to_path_buf(),
        source,
    })
}
