//! Temp workspace wired to a mock extraction service and a recording encoder

use async_trait::async_trait;
use favorites_dl::slideshow::EncodeJob;
use favorites_dl::{Archiver, Config, RetryConfig, VideoEncoder};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Encoder that writes a marker file instead of running ffmpeg
pub struct RecordingEncoder {
    track: Duration,
    jobs: Mutex<Vec<EncodeJob>>,
}

impl RecordingEncoder {
    /// Encoder reporting every audio track as `track` long
    pub fn new(track: Duration) -> Self {
        Self {
            track,
            jobs: Mutex::new(Vec::new()),
        }
    }

    /// Jobs seen so far
    pub fn jobs(&self) -> Vec<EncodeJob> {
        self.jobs.lock().expect("jobs lock").clone()
    }
}

#[async_trait]
impl VideoEncoder for RecordingEncoder {
    async fn audio_duration(&self, _audio: &Path) -> favorites_dl::Result<Duration> {
        Ok(self.track)
    }

    async fn encode(&self, job: &EncodeJob) -> favorites_dl::Result<()> {
        let frames: Vec<String> = job
            .frames
            .iter()
            .map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
            .collect();
        std::fs::write(&job.output, format!("slideshow {}", frames.join(",")))?;
        self.jobs.lock().expect("jobs lock").push(job.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// An isolated run environment
pub struct TestWorkspace {
    /// Root of every path in [`TestWorkspace::config`]
    pub dir: TempDir,
    /// Extraction service and media host
    pub server: MockServer,
    /// Encoder handed to archivers built by this workspace
    pub encoder: Arc<RecordingEncoder>,
}

impl TestWorkspace {
    /// Fresh workspace with no export, cursor or outputs
    pub async fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
            server: MockServer::start().await,
            encoder: Arc::new(RecordingEncoder::new(Duration::from_secs(3))),
        }
    }

    /// Configuration pointing every path into the workspace
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.link_delay = Duration::ZERO;
        config.service.api_url = format!("{}/", self.server.uri());
        config.paths.export_file = self.path("user_data_tiktok.json");
        config.paths.download_dir = self.path("downloads");
        config.paths.scratch_dir = self.path("img_dir");
        config.paths.cursor_file = self.path("last_downloaded_link.txt");
        config.paths.default_audio = self.path("default.mp3");
        config.retry = RetryConfig {
            max_attempts: 2,
            delay: Duration::from_millis(10),
            ..RetryConfig::default()
        };
        config.slideshow.target_width = 64;
        config.slideshow.target_height = 36;
        config
    }

    /// Archiver over [`TestWorkspace::config`]
    pub fn archiver(&self) -> Archiver {
        Archiver::with_encoder(self.config(), self.encoder.clone()).expect("build archiver")
    }

    /// Path inside the workspace
    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// URL on the mock server
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    /// Write the export document
    pub fn write_export(&self, document: &Value) {
        std::fs::write(
            self.path("user_data_tiktok.json"),
            serde_json::to_vec_pretty(document).expect("serialize export"),
        )
        .expect("write export");
    }

    /// Create the default audio asset
    pub fn write_default_audio(&self) {
        std::fs::write(self.path("default.mp3"), b"ID3 default").expect("write default audio");
    }

    /// Create a file in the output directory
    pub fn write_output(&self, name: &str, contents: &[u8]) {
        let dir = self.path("downloads");
        std::fs::create_dir_all(&dir).expect("create downloads");
        std::fs::write(dir.join(name), contents).expect("write output");
    }

    /// Answer service requests for `link` with `response`
    pub async fn resolve(&self, link: &str, response: Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .and(body_partial_json(json!({ "url": link })))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .mount(&self.server)
            .await;
    }

    /// Serve `body` at `route`
    pub async fn host(&self, route: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Number of resolution requests the service has received
    pub async fn resolve_calls(&self) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .count()
    }
}
