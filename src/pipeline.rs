//! Per-link orchestration
//!
//! Each pending link goes through exactly one path and ends in a terminal
//! [`LinkOutcome`]:
//!
//! ```text
//! resolve ─┬─ Direct  ── reserve slot ── download ──────────────── Done | Failed
//!          ├─ Gallery ── fetch assets ── prepare ── reserve slot ── encode ── Done | Failed
//!          └─ Failure | Unrecognized ───────────────────────────── Skipped
//! ```
//!
//! Links are processed strictly one after another. An output slot is only
//! reserved right before the final artifact is written, so skipped links and
//! galleries that never reach the encoder leave the numbering untouched.

use crate::config::Config;
use crate::cursor::{CursorStore, LinkCursor, PendingLinks};
use crate::error::{Result, SlideshowError};
use crate::fetcher::Fetcher;
use crate::resolver::ResolveClient;
use crate::sequencer::OutputSequencer;
use crate::slideshow::{
    FfmpegEncoder, NoOpEncoder, PreparedSlideshow, SlideshowAssembler, VideoEncoder, pick_audio,
};
use crate::types::{ExportedLink, LinkOutcome, Resolution, RunSummary};
use crate::utils::{GALLERY_AUDIO_FILE, ScratchDir, remove_if_exists, slide_file_name};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Archives every favorited post not yet processed
///
/// # Examples
///
/// ```no_run
/// use favorites_dl::{Archiver, Config};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let archiver = Archiver::new(Config::default())?;
/// let summary = archiver.run().await?;
/// println!("{} archived, {} failed", summary.done, summary.failed);
/// # Ok(())
/// # }
/// ```
pub struct Archiver {
    config: Config,
    cursor: LinkCursor,
    resolver: ResolveClient,
    fetcher: Fetcher,
    assembler: SlideshowAssembler,
}

impl Archiver {
    /// Create an archiver, locating ffmpeg from configuration or PATH
    ///
    /// Without ffmpeg, direct videos are still archived and gallery posts fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let encoder: Arc<dyn VideoEncoder> = match FfmpegEncoder::from_config(&config.slideshow) {
            Ok(encoder) => Arc::new(encoder),
            Err(e) => {
                warn!(error = %e, "ffmpeg unavailable, gallery posts cannot be archived");
                Arc::new(NoOpEncoder)
            }
        };
        Self::with_encoder(config, encoder)
    }

    /// Create an archiver with a specific slideshow encoder
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an HTTP client
    /// cannot be built.
    pub fn with_encoder(config: Config, encoder: Arc<dyn VideoEncoder>) -> Result<Self> {
        config.validate()?;

        let cursor = LinkCursor::new(
            config.paths.export_file.clone(),
            CursorStore::new(config.paths.cursor_file.clone()),
            config.host_aliases.clone(),
        );
        let resolver = ResolveClient::new(config.service.clone())?;
        let fetcher = Fetcher::new(config.retry.clone())?;
        let assembler = SlideshowAssembler::new(config.slideshow.clone(), encoder);

        Ok(Self {
            config,
            cursor,
            resolver,
            fetcher,
            assembler,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Links the next run would process, without claiming them
    pub fn pending(&self) -> PendingLinks {
        self.cursor.peek()
    }

    /// Claim the pending links and process each one
    ///
    /// Per-link failures are logged and counted; they never stop the run.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output directory cannot be created. That
    /// check runs before the cursor is claimed, so no link is lost to it.
    pub async fn run(&self) -> Result<RunSummary> {
        let download_dir = &self.config.paths.download_dir;
        tokio::fs::create_dir_all(download_dir).await?;

        let links = match self.cursor.claim() {
            PendingLinks::Ready(links) => links,
            PendingLinks::Empty(_) => return Ok(RunSummary::default()),
        };

        let mut sequencer = OutputSequencer::scan(download_dir, self.config.video_extension());
        let mut summary = RunSummary::default();

        for (index, link) in links.iter().enumerate() {
            if index > 0 && !self.config.link_delay.is_zero() {
                tokio::time::sleep(self.config.link_delay).await;
            }

            info!(link = %link, position = index + 1, total = links.len(), "processing link");
            let outcome = self.process_link(link, &mut sequencer).await;
            log_outcome(link, &outcome);
            summary.record(&outcome);
        }

        info!(
            done = summary.done,
            failed = summary.failed,
            skipped = summary.skipped,
            "run complete"
        );
        Ok(summary)
    }

    /// Resolve one link and archive whatever it points to
    pub async fn process_link(
        &self,
        link: &ExportedLink,
        sequencer: &mut OutputSequencer,
    ) -> LinkOutcome {
        let resolution = match self.resolver.resolve(link).await {
            Ok(resolution) => resolution,
            Err(e) => {
                return LinkOutcome::Failed {
                    slot: None,
                    reason: format!("resolution failed: {e}"),
                };
            }
        };
        debug!(link = %link, kind = resolution.kind(), "resolved");

        match resolution {
            Resolution::Direct { media_url } => self.archive_direct(&media_url, sequencer).await,
            Resolution::Gallery {
                image_urls,
                audio_url,
            } => {
                self.archive_gallery(&image_urls, audio_url.as_deref(), sequencer)
                    .await
            }
            Resolution::Failure(reason) => LinkOutcome::Skipped {
                reason: reason.to_string(),
            },
            Resolution::Unrecognized { raw_status, detail } => LinkOutcome::Skipped {
                reason: format!("unrecognized status {raw_status:?}: {detail}"),
            },
        }
    }

    async fn archive_direct(&self, media_url: &str, sequencer: &mut OutputSequencer) -> LinkOutcome {
        let (slot, path) = sequencer.reserve();
        if self.fetcher.download(media_url, &path).await {
            LinkOutcome::Done { slot, path }
        } else {
            remove_if_exists(&path).await;
            LinkOutcome::Failed {
                slot: Some(slot),
                reason: "video download failed".to_string(),
            }
        }
    }

    async fn archive_gallery(
        &self,
        image_urls: &[String],
        audio_url: Option<&str>,
        sequencer: &mut OutputSequencer,
    ) -> LinkOutcome {
        let scratch = match ScratchDir::create(&self.config.paths.scratch_dir) {
            Ok(scratch) => scratch,
            Err(e) => {
                return LinkOutcome::Failed {
                    slot: None,
                    reason: format!("cannot create scratch directory: {e}"),
                };
            }
        };

        let prepared = match self.prepare_gallery(&scratch, image_urls, audio_url).await {
            Ok(prepared) => prepared,
            Err(e) => {
                return LinkOutcome::Failed {
                    slot: None,
                    reason: e.to_string(),
                };
            }
        };

        let (slot, path) = sequencer.reserve();
        match self.assembler.encode(&prepared, &path).await {
            Ok(()) => LinkOutcome::Done { slot, path },
            Err(e) => {
                remove_if_exists(&path).await;
                LinkOutcome::Failed {
                    slot: Some(slot),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn prepare_gallery(
        &self,
        scratch: &ScratchDir,
        image_urls: &[String],
        audio_url: Option<&str>,
    ) -> Result<PreparedSlideshow> {
        let mut images: Vec<PathBuf> = Vec::with_capacity(image_urls.len());
        for (index, url) in image_urls.iter().enumerate() {
            let dest = scratch.join(slide_file_name(index));
            if self.fetcher.download(url, &dest).await {
                images.push(dest);
            } else {
                warn!(index, url = %url, "dropping gallery image that failed to download");
            }
        }
        if images.is_empty() {
            return Err(SlideshowError::NoImages.into());
        }

        let fetched_audio = match audio_url {
            Some(url) => {
                let dest = scratch.join(GALLERY_AUDIO_FILE);
                if self.fetcher.download(url, &dest).await {
                    Some(dest)
                } else {
                    warn!(url = %url, "gallery audio unavailable, falling back to default");
                    None
                }
            }
            None => None,
        };
        let audio = pick_audio(fetched_audio, &self.config.paths.default_audio)?;

        self.assembler.prepare(images, audio, scratch.path()).await
    }
}

fn log_outcome(link: &ExportedLink, outcome: &LinkOutcome) {
    match outcome {
        LinkOutcome::Done { slot, path } => {
            info!(link = %link, slot = slot.get(), ?path, "archived");
        }
        LinkOutcome::Failed { slot, reason } => {
            error!(link = %link, slot = ?slot.map(|s| s.get()), reason = %reason, "link failed");
        }
        LinkOutcome::Skipped { reason } => {
            warn!(link = %link, reason = %reason, "link skipped");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::slideshow::EncodeJob;
    use crate::types::OutputSlot;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgb, RgbImage};
    use serde_json::json;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingEncoder {
        jobs: Mutex<Vec<EncodeJob>>,
        fail: bool,
    }

    #[async_trait]
    impl VideoEncoder for RecordingEncoder {
        async fn audio_duration(&self, _audio: &Path) -> Result<Duration> {
            Ok(Duration::from_secs(4))
        }

        async fn encode(&self, job: &EncodeJob) -> Result<()> {
            // frame files must still exist while encoding
            for frame in &job.frames {
                assert!(frame.exists(), "{frame:?} removed before encode");
            }
            std::fs::write(&job.output, b"partial")?;
            self.jobs.lock().unwrap().push(job.clone());
            if self.fail {
                return Err(SlideshowError::EncodeFailed {
                    output: job.output.clone(),
                    reason: "exit status: 1".to_string(),
                }
                .into());
            }
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Harness {
        dir: TempDir,
        server: MockServer,
        encoder: Arc<RecordingEncoder>,
        archiver: Archiver,
    }

    impl Harness {
        async fn new(fail_encode: bool) -> Self {
            let dir = TempDir::new().unwrap();
            let server = MockServer::start().await;
            let encoder = Arc::new(RecordingEncoder {
                fail: fail_encode,
                ..RecordingEncoder::default()
            });

            let mut config = Config::default();
            config.link_delay = Duration::ZERO;
            config.service.api_url = format!("{}/", server.uri());
            config.paths.export_file = dir.path().join("export.json");
            config.paths.download_dir = dir.path().join("downloads");
            config.paths.scratch_dir = dir.path().join("img_dir");
            config.paths.cursor_file = dir.path().join("cursor.txt");
            config.paths.default_audio = dir.path().join("default.mp3");
            config.retry = RetryConfig {
                max_attempts: 2,
                delay: Duration::from_millis(10),
                ..RetryConfig::default()
            };
            config.slideshow.target_width = 64;
            config.slideshow.target_height = 36;

            let archiver = Archiver::with_encoder(config, encoder.clone()).unwrap();
            Self {
                dir,
                server,
                encoder,
                archiver,
            }
        }

        fn link(&self, id: u32) -> ExportedLink {
            let url = format!("https://www.tiktok.com/@user/video/{id}");
            ExportedLink {
                raw: url.clone(),
                canonical: url,
            }
        }

        fn sequencer(&self) -> OutputSequencer {
            OutputSequencer::scan(self.dir.path().join("downloads"), "mp4")
        }

        async fn respond(&self, link: &ExportedLink, body: serde_json::Value) {
            Mock::given(method("POST"))
                .and(path("/"))
                .and(body_partial_json(json!({ "url": link.canonical })))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }

        async fn serve(&self, route: &str, body: Vec<u8>) {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
                .mount(&self.server)
                .await;
        }

        fn url(&self, route: &str) -> String {
            format!("{}{}", self.server.uri(), route)
        }
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        RgbImage::from_pixel(width, height, Rgb([0, 128, 255]))
            .write_to(&mut bytes, ImageFormat::Jpeg)
            .unwrap();
        bytes.into_inner()
    }

    #[tokio::test]
    async fn direct_video_is_written_to_reserved_slot() {
        let h = Harness::new(false).await;
        std::fs::create_dir_all(h.dir.path().join("downloads")).unwrap();
        std::fs::write(h.dir.path().join("downloads/4.mp4"), b"old").unwrap();

        let link = h.link(1);
        h.respond(&link, json!({ "status": "tunnel", "url": h.url("/media/1.mp4") }))
            .await;
        h.serve("/media/1.mp4", b"video bytes".to_vec()).await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        let expected = h.dir.path().join("downloads/5.mp4");
        assert_eq!(
            outcome,
            LinkOutcome::Done {
                slot: OutputSlot(5),
                path: expected.clone()
            }
        );
        assert_eq!(std::fs::read(expected).unwrap(), b"video bytes");
    }

    #[tokio::test]
    async fn failed_direct_download_burns_slot_and_leaves_no_file() {
        let h = Harness::new(false).await;
        std::fs::create_dir_all(h.dir.path().join("downloads")).unwrap();

        let link = h.link(1);
        h.respond(&link, json!({ "status": "redirect", "url": h.url("/media/gone.mp4") }))
            .await;
        Mock::given(method("GET"))
            .and(path("/media/gone.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&h.server)
            .await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(
            outcome,
            LinkOutcome::Failed {
                slot: Some(OutputSlot(1)),
                ..
            }
        ));
        assert!(!h.dir.path().join("downloads/1.mp4").exists());
        assert_eq!(sequencer.peek(), OutputSlot(2));
    }

    #[tokio::test]
    async fn service_error_is_skipped_without_consuming_slot() {
        let h = Harness::new(false).await;
        let link = h.link(1);
        h.respond(
            &link,
            json!({ "status": "error", "error": { "code": "error.api.fetch.empty" } }),
        )
        .await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        match outcome {
            LinkOutcome::Skipped { reason } => assert!(reason.contains("error.api.fetch.empty")),
            other => panic!("expected skip, got {other:?}"),
        }
        assert_eq!(sequencer.peek(), OutputSlot(1));
    }

    #[tokio::test]
    async fn video_picker_is_skipped_as_unrecognized() {
        let h = Harness::new(false).await;
        let link = h.link(1);
        h.respond(
            &link,
            json!({ "status": "picker", "picker": [{ "type": "video", "url": h.url("/v.mp4") }] }),
        )
        .await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(outcome, LinkOutcome::Skipped { .. }));
        assert_eq!(sequencer.peek(), OutputSlot(1));
        assert!(h.encoder.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn service_http_error_is_skipped_without_slot() {
        let h = Harness::new(false).await;
        let link = h.link(1);
        // no mock mounted, so the service answers 404
        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        match outcome {
            LinkOutcome::Skipped { reason } => assert!(reason.starts_with("HTTP 404")),
            other => panic!("expected skip, got {other:?}"),
        }
        assert_eq!(sequencer.peek(), OutputSlot(1));
    }

    #[tokio::test]
    async fn gallery_drops_failed_images_and_uses_fetched_audio() {
        let h = Harness::new(false).await;
        std::fs::create_dir_all(h.dir.path().join("downloads")).unwrap();
        let link = h.link(7);
        h.respond(
            &link,
            json!({
                "status": "picker",
                "picker": [
                    { "type": "photo", "url": h.url("/img/0.jpg") },
                    { "type": "photo", "url": h.url("/img/missing.jpg") },
                    { "type": "photo", "url": h.url("/img/2.jpg") }
                ],
                "audio": h.url("/audio/track.mp3")
            }),
        )
        .await;
        h.serve("/img/0.jpg", jpeg_bytes(300, 600)).await;
        h.serve("/img/2.jpg", jpeg_bytes(800, 200)).await;
        h.serve("/audio/track.mp3", b"ID3 audio".to_vec()).await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        let output = h.dir.path().join("downloads/1.mp4");
        assert_eq!(
            outcome,
            LinkOutcome::Done {
                slot: OutputSlot(1),
                path: output.clone()
            }
        );

        let jobs = h.encoder.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        let scratch = h.dir.path().join("img_dir");
        assert_eq!(
            jobs[0].frames,
            vec![scratch.join("slide_0.jpg"), scratch.join("slide_2.jpg")]
        );
        assert_eq!(jobs[0].audio, scratch.join("audio.mp3"));
        assert_eq!(jobs[0].audio_loop.total, Duration::from_secs(5));
        assert_eq!(jobs[0].audio_loop.repetitions, 2);
        assert_eq!(jobs[0].output, output);
        assert!(!scratch.exists(), "scratch directory must be removed");
    }

    #[tokio::test]
    async fn gallery_without_audio_uses_default_track() {
        let h = Harness::new(false).await;
        std::fs::write(h.dir.path().join("default.mp3"), b"default").unwrap();
        std::fs::create_dir_all(h.dir.path().join("downloads")).unwrap();
        let link = h.link(8);
        h.respond(
            &link,
            json!({ "status": "picker", "picker": [{ "type": "photo", "url": h.url("/img/a.jpg") }] }),
        )
        .await;
        h.serve("/img/a.jpg", jpeg_bytes(100, 100)).await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(outcome, LinkOutcome::Done { .. }));
        let jobs = h.encoder.jobs.lock().unwrap();
        assert_eq!(jobs[0].audio, h.dir.path().join("default.mp3"));
    }

    #[tokio::test]
    async fn gallery_without_any_audio_fails_before_reserving_slot() {
        let h = Harness::new(false).await;
        let link = h.link(9);
        h.respond(
            &link,
            json!({ "status": "picker", "picker": [{ "type": "photo", "url": h.url("/img/a.jpg") }] }),
        )
        .await;
        h.serve("/img/a.jpg", jpeg_bytes(100, 100)).await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(outcome, LinkOutcome::Failed { slot: None, .. }));
        assert_eq!(sequencer.peek(), OutputSlot(1));
        assert!(!h.dir.path().join("img_dir").exists());
    }

    #[tokio::test]
    async fn gallery_whose_images_all_fail_consumes_no_slot() {
        let h = Harness::new(false).await;
        std::fs::write(h.dir.path().join("default.mp3"), b"default").unwrap();
        let link = h.link(10);
        h.respond(
            &link,
            json!({ "status": "picker", "picker": [{ "type": "photo", "url": h.url("/img/none.jpg") }] }),
        )
        .await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(outcome, LinkOutcome::Failed { slot: None, .. }));
        assert_eq!(sequencer.peek(), OutputSlot(1));
        assert!(h.encoder.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_encode_removes_partial_output_and_scratch() {
        let h = Harness::new(true).await;
        std::fs::write(h.dir.path().join("default.mp3"), b"default").unwrap();
        std::fs::create_dir_all(h.dir.path().join("downloads")).unwrap();
        let link = h.link(11);
        h.respond(
            &link,
            json!({ "status": "picker", "picker": [{ "type": "photo", "url": h.url("/img/a.jpg") }] }),
        )
        .await;
        h.serve("/img/a.jpg", jpeg_bytes(100, 100)).await;

        let mut sequencer = h.sequencer();
        let outcome = h.archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(
            outcome,
            LinkOutcome::Failed {
                slot: Some(OutputSlot(1)),
                ..
            }
        ));
        assert!(!h.dir.path().join("downloads/1.mp4").exists());
        assert!(!h.dir.path().join("img_dir").exists());
        assert_eq!(sequencer.peek(), OutputSlot(2));
    }

    #[tokio::test]
    async fn unreachable_service_fails_link_without_slot() {
        let mut config = Config::default();
        let dir = TempDir::new().unwrap();
        config.service.api_url = "http://127.0.0.1:1/".to_string();
        config.paths.download_dir = dir.path().join("downloads");
        let archiver =
            Archiver::with_encoder(config, Arc::new(RecordingEncoder::default())).unwrap();

        let link = ExportedLink {
            raw: "https://www.tiktok.com/@user/video/1".to_string(),
            canonical: "https://www.tiktok.com/@user/video/1".to_string(),
        };
        let mut sequencer = OutputSequencer::scan(dir.path().join("downloads"), "mp4");
        let outcome = archiver.process_link(&link, &mut sequencer).await;

        assert!(matches!(outcome, LinkOutcome::Failed { slot: None, .. }));
        assert_eq!(sequencer.peek(), OutputSlot(1));
    }

    #[tokio::test]
    async fn run_with_missing_export_does_nothing() {
        let h = Harness::new(false).await;
        let summary = h.archiver.run().await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(h.dir.path().join("downloads").is_dir());
        assert!(!h.dir.path().join("cursor.txt").exists());
    }
}
