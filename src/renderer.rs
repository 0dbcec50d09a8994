//! Lifecycle of the single map widget showing the current points.
//!
//! ```text
//! Uninitialized --non-empty points--> Initializing --load--> Ready
//!       ^                                  |                   |
//!       +---------- empty points ----------+-------------------+
//! any state --dispose--> Disposed
//! ```
//!
//! Non-empty points arriving while a widget exists tear it down and build a
//! fresh one. Construction or attach errors park the renderer in `Failed`.

use crate::config::MapConfig;
use crate::error::RenderError;
use crate::features::to_feature_collection;
use crate::layer::{LayerSpec, SourceSpec};
use crate::types::PointCollection;
use crate::widget::{MapBackend, MapOptions, MapWidget};
use tracing::{debug, error, info};

/// Ids and paint constants of the point layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PointLayer {
    pub source_id: String,
    pub layer_id: String,
    pub opacity: f64,
}

impl PointLayer {
    pub fn from_config(map: &MapConfig) -> Self {
        Self {
            source_id: map.source_id.clone(),
            layer_id: map.layer_id.clone(),
            opacity: map.circle_opacity,
        }
    }
}

impl Default for PointLayer {
    fn default() -> Self {
        Self {
            source_id: "dataPoints".to_string(),
            layer_id: "circle-layer".to_string(),
            opacity: 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
    Disposed,
}

enum MapState<W> {
    Uninitialized,
    Initializing(W),
    Ready(W),
    Failed { reason: String },
    Disposed,
}

pub struct MapRenderer<B: MapBackend> {
    backend: B,
    options: MapOptions,
    layer: PointLayer,
    points: PointCollection,
    state: MapState<B::Widget>,
}

impl<B: MapBackend> MapRenderer<B> {
    pub fn new(backend: B, options: MapOptions, layer: PointLayer) -> Self {
        Self {
            backend,
            options,
            layer,
            points: PointCollection::default(),
            state: MapState::Uninitialized,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            MapState::Uninitialized => Phase::Uninitialized,
            MapState::Initializing(_) => Phase::Initializing,
            MapState::Ready(_) => Phase::Ready,
            MapState::Failed { .. } => Phase::Failed,
            MapState::Disposed => Phase::Disposed,
        }
    }

    /// Why the renderer is `Failed`, if it is.
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            MapState::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// The live widget while initializing or ready.
    pub fn widget(&self) -> Option<&B::Widget> {
        match &self.state {
            MapState::Initializing(w) | MapState::Ready(w) => Some(w),
            _ => None,
        }
    }

    pub fn options(&self) -> &MapOptions {
        &self.options
    }

    pub fn points(&self) -> &PointCollection {
        &self.points
    }

    /// Replaces the point collection and rebuilds the widget for it.
    pub fn set_points(&mut self, points: PointCollection) -> Result<(), RenderError> {
        if matches!(self.state, MapState::Disposed) {
            return Err(RenderError::Disposed);
        }

        if let Some(widget) = self.take_widget() {
            debug!("Tearing down map for new point collection");
            widget.remove();
        }
        self.points = points;
        self.state = MapState::Uninitialized;

        if self.points.is_empty() {
            info!("No points to show, map stays uninitialized");
            return Ok(());
        }

        match self.backend.construct(&self.options) {
            Ok(widget) => {
                debug!(container = %self.options.container, points = self.points.len(), "Map constructed");
                self.state = MapState::Initializing(widget);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Map construction failed");
                self.state = MapState::Failed { reason: e.to_string() };
                Err(RenderError::Construct(e))
            }
        }
    }

    /// Handles the widget's load event: registers the source and the circle layer.
    pub fn on_load(&mut self) -> Result<(), RenderError> {
        let mut widget = match std::mem::replace(&mut self.state, MapState::Uninitialized) {
            MapState::Initializing(widget) => widget,
            MapState::Disposed => {
                self.state = MapState::Disposed;
                return Err(RenderError::Disposed);
            }
            other => {
                debug!("Ignoring load event outside initialization");
                self.state = other;
                return Ok(());
            }
        };

        let source = SourceSpec::GeoJson {
            data: to_feature_collection(&self.points),
        };
        let layer = LayerSpec::styled_circles(&self.layer.layer_id, &self.layer.source_id, self.layer.opacity);

        let attached = widget
            .add_source(&self.layer.source_id, source)
            .and_then(|()| widget.add_layer(layer));

        match attached {
            Ok(()) => {
                info!(points = self.points.len(), layer = %self.layer.layer_id, "Point layer attached");
                self.state = MapState::Ready(widget);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Attaching point layer failed");
                widget.remove();
                self.state = MapState::Failed { reason: e.to_string() };
                Err(RenderError::Attach(e))
            }
        }
    }

    /// Forwards a pending widget load event, if there is one.
    pub fn pump(&mut self) -> Result<(), RenderError> {
        let loaded = match &mut self.state {
            MapState::Initializing(widget) => widget.poll_load(),
            _ => false,
        };
        if loaded {
            self.on_load()?;
        }
        Ok(())
    }

    /// Releases the widget. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(widget) = self.take_widget() {
            debug!("Removing map");
            widget.remove();
        }
        self.state = MapState::Disposed;
    }

    fn take_widget(&mut self) -> Option<B::Widget> {
        match std::mem::replace(&mut self.state, MapState::Uninitialized) {
            MapState::Initializing(w) | MapState::Ready(w) => Some(w),
            other => {
                self.state = other;
                None
            }
        }
    }
}

impl<B: MapBackend> Drop for MapRenderer<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}
