use crate::config::{DataInput, InputConfig};
use crate::error::LoadError;
use crate::styling::style_record;
use crate::types::{PointCollection, RawCityRecord, StyledPoint};
use rayon::prelude::*;
use reqwest::Client;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Anything that can deliver the raw city records in a single read.
pub trait GeoDataSource {
    fn fetch(&self) -> impl Future<Output = Result<Vec<RawCityRecord>, LoadError>> + Send;
}

/// Reads the records from a remote endpoint returning a JSON array.
pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LoadError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl GeoDataSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<RawCityRecord>, LoadError> {
        info!(url = %self.url, "Fetching city records");
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        decode_json_records(&body)
    }
}

/// Reads the records from a local `.json` or `.csv` file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GeoDataSource for FileSource {
    async fn fetch(&self) -> Result<Vec<RawCityRecord>, LoadError> {
        let extension = self.path.extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .ok_or_else(|| LoadError::UnsupportedFormat(format!("{:?} has no extension", self.path)))?;

        info!(path = ?self.path, "Reading city records");
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;

        match extension.as_str() {
            "json" => decode_json_records(&bytes),
            "csv" => decode_csv_records(&bytes),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// The source picked by the configuration file.
pub enum ConfiguredSource {
    Http(HttpSource),
    File(FileSource),
}

impl ConfiguredSource {
    pub fn from_config(input: &InputConfig) -> anyhow::Result<Self> {
        Ok(match input.data_input()? {
            DataInput::Endpoint(url) => {
                Self::Http(HttpSource::new(url, Duration::from_secs(input.timeout_secs))?)
            }
            DataInput::File(path) => Self::File(FileSource::new(path)),
        })
    }
}

impl GeoDataSource for ConfiguredSource {
    async fn fetch(&self) -> Result<Vec<RawCityRecord>, LoadError> {
        match self {
            Self::Http(source) => source.fetch().await,
            Self::File(source) => source.fetch().await,
        }
    }
}

/// Decodes a JSON array of records. Entries that don't look like a record are skipped.
pub fn decode_json_records(bytes: &[u8]) -> Result<Vec<RawCityRecord>, LoadError> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(bytes)?;
    let total = entries.len();

    let records: Vec<RawCityRecord> = entries.into_iter().enumerate()
        .filter_map(|(i, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index = i, error = %e, "Skipping undecodable record");
                None
            }
        })
        .collect();

    debug!(decoded = records.len(), total, "Decoded JSON records");
    Ok(records)
}

/// Decodes CSV with a `city,lat,long,dataPoint` header row.
pub fn decode_csv_records(bytes: &[u8]) -> Result<Vec<RawCityRecord>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(bytes);
    rdr.headers()?;

    let mut records = Vec::new();
    for (i, result) in rdr.deserialize::<RawCityRecord>().enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => warn!(row = i + 1, error = %e, "Skipping undecodable CSV row"),
        }
    }

    debug!(decoded = records.len(), "Decoded CSV records");
    Ok(records)
}

/// Styles every complete record; incomplete ones are logged and dropped.
pub fn transform_records(records: &[RawCityRecord]) -> PointCollection {
    let points: Vec<StyledPoint> = records.par_iter()
        .filter_map(|record| match style_record(record) {
            Ok(point) => Some(point),
            Err(e) => {
                warn!(city = ?record.city, reason = %e, "Dropping malformed city record");
                None
            }
        })
        .collect();

    let dropped = records.len() - points.len();
    if dropped > 0 {
        warn!(dropped, kept = points.len(), "Some city records were malformed");
    }
    PointCollection::new(points)
}

/// Loads the point collection once from its source.
pub struct DataLoader<S> {
    source: S,
}

impl<S: GeoDataSource> DataLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub async fn load_points(&self) -> Result<PointCollection, LoadError> {
        let records = self.source.fetch().await?;
        let points = transform_records(&records);
        info!(points = points.len(), "Loaded styled points");
        Ok(points)
    }

    /// Like [`Self::load_points`], but a failed load yields an empty collection.
    pub async fn load_points_or_empty(&self) -> PointCollection {
        match self.load_points().await {
            Ok(points) => points,
            Err(e) => {
                error!(error = %e, "Failed to load city records");
                PointCollection::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    struct FixedSource(Vec<RawCityRecord>);

    impl GeoDataSource for FixedSource {
        async fn fetch(&self) -> Result<Vec<RawCityRecord>, LoadError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl GeoDataSource for FailingSource {
        async fn fetch(&self) -> Result<Vec<RawCityRecord>, LoadError> {
            Err(LoadError::Status {
                url: "https://example.org".into(),
                status: 503,
            })
        }
    }

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn file_loader(path: &std::path::Path) -> DataLoader<FileSource> {
        DataLoader::new(FileSource::new(path))
    }

    fn raw(city: &str, population: f64) -> RawCityRecord {
        RawCityRecord {
            city: Some(city.into()),
            lat: Some(1.0),
            long: Some(2.0),
            data_point: Some(population),
        }
    }

    #[tokio::test]
    async fn json_file_is_loaded_and_styled() {
        let file = temp_file(
            ".json",
            r#"[
                {"city":"A","lat":10,"long":20,"dataPoint":50000},
                {"city":"B","lat":11,"long":21,"dataPoint":150000},
                {"city":"C","lat":12,"long":22,"dataPoint":10000000}
            ]"#,
        );

        let points = file_loader(file.path()).load_points().await.unwrap();
        let colors: Vec<&str> = points.iter().map(|p| p.color.as_str()).collect();
        assert_eq!(colors, ["#8F1CCD", "#A221B9", "#E8AD85"]);
        assert_eq!(points.iter().next().unwrap().longitude, 20.0);
    }

    #[tokio::test]
    async fn malformed_json_entries_are_dropped() {
        let file = temp_file(
            ".json",
            r#"[
                {"city":"A","lat":10,"long":20,"dataPoint":50000},
                {"city":"NoPopulation","lat":10,"long":20},
                {"city":"BadLat","lat":"north","long":20,"dataPoint":1},
                42
            ]"#,
        );

        let points = file_loader(file.path()).load_points().await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points.iter().next().unwrap().name, "A");
    }

    #[tokio::test]
    async fn csv_file_is_loaded() {
        let file = temp_file(
            ".csv",
            "city,lat,long,dataPoint\nA, 10, 20, 250000\nB,11,21,\nC,12,x,5\n",
        );

        let points = file_loader(file.path()).load_points().await.unwrap();
        assert_eq!(points.len(), 1);
        let a = points.iter().next().unwrap();
        assert_eq!(a.name, "A");
        assert_eq!(a.color, "#E0329D");
    }

    #[tokio::test]
    async fn unsupported_extension_is_an_error() {
        let file = temp_file(".xml", "<cities/>");
        let err = file_loader(file.path()).load_points().await.unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "xml"));
    }

    #[tokio::test]
    async fn geojson_extension_is_unsupported() {
        let file = temp_file(".geojson", r#"{"type":"FeatureCollection","features":[]}"#);
        let err = file_loader(file.path()).load_points().await.unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(ext) if ext == "geojson"));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_loader(&dir.path().join("absent.json"))
            .load_points()
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn non_array_payload_is_a_json_error() {
        let file = temp_file(".json", r#"{"city":"A"}"#);
        let err = file_loader(file.path()).load_points().await.unwrap_err();
        assert!(matches!(err, LoadError::Json(_)));
    }

    #[tokio::test]
    async fn failure_becomes_empty_collection() {
        let points = DataLoader::new(FailingSource).load_points_or_empty().await;
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn empty_fetch_gives_empty_collection() {
        let points = DataLoader::new(FixedSource(Vec::new())).load_points().await.unwrap();
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn order_is_preserved() {
        let records: Vec<RawCityRecord> =
            (0..500).map(|i| raw(&format!("city-{i}"), i as f64 * 1_000.0)).collect();
        let points = DataLoader::new(FixedSource(records)).load_points().await.unwrap();
        let names: Vec<String> = points.iter().map(|p| p.name.clone()).collect();
        let expected: Vec<String> = (0..500).map(|i| format!("city-{i}")).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_http_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = HttpSource::new(format!("http://127.0.0.1:{port}/data/v1/geoData"), Duration::from_secs(5)).unwrap();
        let err = DataLoader::new(source).load_points().await.unwrap_err();
        assert!(matches!(err, LoadError::Http(_)));
    }

    /// Serves one canned HTTP response on a local port and returns the endpoint URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/data/v1/geoData")
    }

    #[tokio::test]
    async fn error_status_is_a_status_error() {
        let url = serve_once("503 Service Unavailable", r#"{"error":"down"}"#).await;
        let source = HttpSource::new(url, Duration::from_secs(5)).unwrap();

        let err = DataLoader::new(source).load_points().await.unwrap_err();
        assert!(matches!(err, LoadError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn endpoint_records_are_styled() {
        let body = r#"[
            {"city": "A", "lat": 10, "long": 20, "dataPoint": 50000},
            {"city": "B", "lat": -33.9, "long": 151.2, "dataPoint": 10000000}
        ]"#;
        let url = serve_once("200 OK", body).await;
        let source = HttpSource::new(url, Duration::from_secs(5)).unwrap();

        let points = DataLoader::new(source).load_points().await.unwrap();
        assert_eq!(points.len(), 2);
        let styled: Vec<(&str, &str)> = points.iter()
            .map(|p| (p.name.as_str(), p.color.as_str()))
            .collect();
        assert_eq!(styled, vec![("A", "#8F1CCD"), ("B", "#E8AD85")]);
        let radii: Vec<f64> = points.iter().map(|p| p.radius).collect();
        assert!((radii[0] - 1.0).abs() < 1e-9 && (radii[1] - 1.6).abs() < 1e-9);
    }
}
