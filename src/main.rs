pub mod types;
pub mod config;
pub mod error;
pub mod styling;
pub mod data;
pub mod features;
pub mod layer;
pub mod widget;
pub mod renderer;
pub mod render;
pub mod html;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::data::{ConfiguredSource, DataLoader};
use crate::error::{LoadError, WidgetError};
use crate::renderer::{MapRenderer, Phase, PointLayer};
use crate::types::PointCollection;
use crate::widget::{MapBackend, MapOptions, StyleDocument};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the city points and render them on the map
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Backend::Png)]
        backend: Backend,
    },
    /// Write the styled points as GeoJSON along with the circle layer definition
    Export {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Rasterize to map.png
    Png,
    /// Write a mapbox-gl page to index.html
    Html,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { config, backend } => {
            info!(config = ?config, "Rendering city map");
            let app_config = AppConfig::load_from_file(config)?;

            // 1. Load Data. A failed load still writes an error page before exiting non-zero.
            let source = ConfiguredSource::from_config(&app_config.input)?;
            let loaded = DataLoader::new(source).load_points().await;

            // 2. Build the map and attach the point layer
            let style = StyleDocument::load(&app_config.map.style)
                .with_context(|| format!("Failed to load map style: {:?}", app_config.map.style))?;
            let options = MapOptions::from_config(&app_config.map, style);
            let layer = PointLayer::from_config(&app_config.map);
            let out_dir = prepare_output_dir(&app_config.output.dir)?;

            match backend {
                Backend::Png => {
                    let backend = render::HeadlessBackend {
                        width: app_config.output.width,
                        height: app_config.output.height,
                        point_scale: app_config.output.point_scale,
                    };
                    let mut blank = backend.clone();
                    let path = out_dir.join("map.png");
                    show_points(
                        backend,
                        options,
                        layer,
                        loaded,
                        |map| map.save_png(&path),
                        |options, _| blank.save_blank_png(options, &path),
                    )?;
                }
                Backend::Html => {
                    let path = out_dir.join("index.html");
                    show_points(
                        html::HtmlBackend,
                        options,
                        layer,
                        loaded,
                        |map| map.write_page(&path),
                        |options, message| html::write_status_page(options, message, &path),
                    )?;
                }
            }
        }
        Commands::Export { config } => {
            let app_config = AppConfig::load_from_file(config)?;
            let points = load_points(&app_config).await?;
            if points.is_empty() {
                warn!("No city points loaded, exporting an empty collection");
            }

            let out_dir = prepare_output_dir(&app_config.output.dir)?;
            let collection = features::to_feature_collection(&points);
            let geojson_path = out_dir.join("points.geojson");
            fs::write(&geojson_path, serde_json::to_string_pretty(&collection)?)
                .with_context(|| format!("Failed to write {:?}", geojson_path))?;

            let point_layer = PointLayer::from_config(&app_config.map);
            let layer_spec = layer::LayerSpec::styled_circles(
                &point_layer.layer_id,
                &point_layer.source_id,
                point_layer.opacity,
            );
            let layer_path = out_dir.join("layer.json");
            fs::write(&layer_path, serde_json::to_string_pretty(&layer_spec)?)
                .with_context(|| format!("Failed to write {:?}", layer_path))?;

            info!(points = points.len(), dir = ?out_dir, "Export complete");
        }
    }

    Ok(())
}

async fn load_points(config: &AppConfig) -> Result<PointCollection> {
    let source = ConfiguredSource::from_config(&config.input)?;
    Ok(DataLoader::new(source).load_points_or_empty().await)
}

fn prepare_output_dir(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    Ok(dir.to_path_buf())
}

/// Runs the map lifecycle once: construct, wait for load, write, dispose.
///
/// With nothing to draw, `write_status` gets the base map options and a message
/// saying whether the data was empty or failed to load.
fn show_points<B, F, S>(
    backend: B,
    options: MapOptions,
    layer: PointLayer,
    loaded: Result<PointCollection, LoadError>,
    write: F,
    write_status: S,
) -> Result<()>
where
    B: MapBackend,
    F: FnOnce(&B::Widget) -> Result<(), WidgetError>,
    S: FnOnce(&MapOptions, &str) -> Result<(), WidgetError>,
{
    let (points, load_error) = match loaded {
        Ok(points) => (points, None),
        Err(e) => {
            error!(error = %e, "Failed to load city records");
            (PointCollection::default(), Some(e))
        }
    };

    let mut renderer = MapRenderer::new(backend, options, layer);
    let shown = renderer.set_points(points).and_then(|()| renderer.pump());
    if let Err(e) = shown {
        error!(error = %e, reason = renderer.failure().unwrap_or("unknown"), "Map failed");
        return Err(e.into());
    }

    match renderer.phase() {
        Phase::Ready => {
            if let Some(map) = renderer.widget() {
                write(map)?;
                info!(points = renderer.points().len(), "Map written");
            }
        }
        Phase::Uninitialized => {
            let message = match &load_error {
                Some(e) => format!("Could not load city data: {e}"),
                None => "No city data to show".to_string(),
            };
            write_status(renderer.options(), &message)?;
            warn!(status = %message, "Map left empty");
        }
        phase => warn!(?phase, "Map did not finish loading"),
    }

    renderer.dispose();

    match load_error {
        Some(e) => Err(anyhow::Error::new(e).context("Failed to load city records")),
        None => Ok(()),
    }
}
