//! Runs workflow effects on tokio and feeds their results back.

use super::machine::{DEMO_AREA, Detection, Effect, Event, Workflow};
use super::progress::{SimulatedProgress, Stage, Tick};
use super::state::{Job, Mode, Screen, Tips};
use crate::error::{AppError, Result, UploadError};
use crate::geometry::Area;
use crate::image_processing::{FRAME_TIMESTAMP, ImageProcessor};
use crate::media::{FrameSource, VideoInput};
use crate::preview;
use crate::selection::SelectionEditor;
use crate::services::{AudioAnalyzer, TIPS_FAILED, WatermarkAi};
use crate::upload::{self, FileCandidate};
use crate::watermark::WatermarkConfig;
use futures::FutureExt;
use image::DynamicImage;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

/// Area reported for pasted links, which are never analyzed.
pub const LINK_AREA: Area = Area {
    x: 75.0,
    y: 80.0,
    width: 20.0,
    height: 15.0,
};

const EVENT_BUFFER_SIZE: usize = 32;

const TASK_PANICKED: &str = "background task panicked";

/// The external capabilities a session runs against.
#[derive(Clone)]
pub struct Services {
    pub ai: Arc<dyn WatermarkAi>,
    pub frames: Arc<dyn FrameSource>,
    pub audio: Arc<dyn AudioAnalyzer>,
}

/// Delays of the simulated parts of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Period of the fake progress ticker.
    pub tick: Duration,
    /// How long "analyzing" a pasted link takes.
    pub link_detection: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(120),
            link_detection: Duration::from_millis(2500),
        }
    }
}

/// A [`Workflow`] plus the tasks working on its behalf.
///
/// User actions are methods; background results queue up until
/// [`next_event`](Self::next_event) (or one of the helpers built on it)
/// applies them.
pub struct Session {
    workflow: Workflow,
    services: Services,
    timings: Timings,
    events_tx: mpsc::Sender<Event>,
    events_rx: mpsc::Receiver<Event>,
    /// The fake progress ticker and the screen generation that owns it.
    ticker: Option<(u64, JoinHandle<()>)>,
}

impl Session {
    pub fn new(workflow: Workflow, services: Services) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER_SIZE);
        Self {
            workflow,
            services,
            timings: Timings::default(),
            events_tx,
            events_rx,
            ticker: None,
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn screen(&self) -> &Screen {
        self.workflow.screen()
    }

    pub fn select_action(&mut self, mode: Mode) -> Result<()> {
        self.workflow.select_action(mode)
    }

    /// Validates a file on disk and, if it passes, moves on with it.
    ///
    /// A rejected file is shown on the upload screen and also returned as
    /// [`AppError::Upload`].
    pub async fn upload_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.expect_upload("upload_file")?;
        match FileCandidate::from_path(path).await {
            Ok(candidate) => self.upload(candidate).await,
            Err(rejection) => self.reject(rejection),
        }
    }

    /// Like [`upload_file`](Self::upload_file) with the size already known.
    pub async fn upload(&mut self, candidate: FileCandidate) -> Result<()> {
        self.expect_upload("upload")?;
        if let Err(rejection) = upload::validate(&candidate, self.services.frames.as_ref()).await {
            return self.reject(rejection);
        }
        let effects = self.workflow.submit_file(&candidate)?;
        self.dispatch(effects);
        Ok(())
    }

    pub fn submit_link(&mut self, raw: &str) -> Result<()> {
        self.expect_upload("submit_link")?;
        match upload::parse_link(raw) {
            Ok(link) => {
                let effects = self.workflow.submit_link(link)?;
                self.dispatch(effects);
                Ok(())
            }
            Err(rejection) => self.reject(rejection),
        }
    }

    fn expect_upload(&self, action: &'static str) -> Result<()> {
        match self.workflow.screen() {
            Screen::Upload { .. } => Ok(()),
            other => Err(AppError::InvalidTransition {
                action,
                screen: other.name(),
            }),
        }
    }

    fn reject(&mut self, rejection: UploadError) -> Result<()> {
        self.workflow.reject_upload(&rejection)?;
        Err(rejection.into())
    }

    pub fn area_editor(&mut self) -> Option<&mut SelectionEditor> {
        self.workflow.area_editor()
    }

    pub fn watermark_editor(&mut self) -> Option<&mut WatermarkConfig> {
        self.workflow.watermark_editor()
    }

    pub fn confirm_area(&mut self) -> Result<()> {
        let effects = self.workflow.confirm_area()?;
        self.dispatch(effects);
        Ok(())
    }

    pub fn apply_watermark(&mut self) -> Result<()> {
        let effects = self.workflow.apply_watermark()?;
        self.dispatch(effects);
        Ok(())
    }

    pub fn back(&mut self) -> Result<()> {
        self.workflow.back()?;
        self.sync_ticker();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.workflow.reset();
        self.sync_ticker();
    }

    /// Waits for one background result and applies it.
    ///
    /// Returns `false` if the result was stale and dropped.
    pub async fn next_event(&mut self) -> bool {
        let Some(event) = self.events_rx.recv().await else {
            return false;
        };
        let applied = self.workflow.apply(event);
        self.sync_ticker();
        applied
    }

    /// Applies results until the screen no longer waits on a task.
    pub async fn settle(&mut self) {
        while self.workflow.screen().is_busy() {
            self.next_event().await;
        }
    }

    /// Applies results until the tips request has an answer.
    pub async fn wait_for_tips(&mut self) {
        while *self.workflow.tips() == Tips::Loading {
            self.next_event().await;
        }
    }

    /// Renders the result preview from the source video.
    ///
    /// Returns `None` for link input, which has no frames to show.
    pub async fn render_preview(&self) -> Result<Option<DynamicImage>> {
        let Screen::Result(outcome) = self.workflow.screen() else {
            return Err(AppError::InvalidTransition {
                action: "render_preview",
                screen: self.workflow.screen().name(),
            });
        };
        let Some(video) = self.workflow.resolve(outcome.job.input()) else {
            return Ok(None);
        };
        let frame = self.services.frames.frame_at(video, FRAME_TIMESTAMP).await?;

        let rendered = match &outcome.job {
            Job::Remove { area, .. } => {
                let processed = outcome
                    .processed_frame
                    .as_deref()
                    .map(image::load_from_memory)
                    .transpose()
                    .map_err(|e| AppError::image(format!("Failed to decode processed frame: {}", e)))?;
                preview::render_removal(&frame, area, processed.as_ref())
            }
            Job::Add { config, .. } => match &config.image {
                Some(path) => {
                    let mark = image::open(path)
                        .map_err(|e| AppError::image(format!("Failed to load watermark image: {}", e)))?;
                    preview::render_watermark(&frame, config, &mark)
                }
                None => frame,
            },
        };
        Ok(Some(rendered))
    }

    fn dispatch(&mut self, effects: Vec<Effect>) {
        self.sync_ticker();
        for effect in effects {
            let tx = self.events_tx.clone();
            let services = self.services.clone();
            match effect {
                Effect::Detect {
                    generation,
                    input,
                    video,
                } => {
                    let link_delay = self.timings.link_detection;
                    let fallback = Event::Detected {
                        generation,
                        result: Err(TASK_PANICKED.to_string()),
                    };
                    spawn_guarded(tx.clone(), fallback, async move {
                        let result = detect(&services, &input, video.as_deref(), link_delay)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = tx.send(Event::Detected { generation, result }).await;
                    });
                }
                Effect::Simulate {
                    generation,
                    messages,
                } => {
                    let fallback = Event::ProcessingFailed {
                        generation,
                        error: TASK_PANICKED.to_string(),
                    };
                    let handle = spawn_guarded(
                        tx.clone(),
                        fallback,
                        run_ticker(tx, generation, messages, self.timings.tick),
                    );
                    if let Some((_, previous)) = self.ticker.replace((generation, handle)) {
                        previous.abort();
                    }
                }
                Effect::Pipeline {
                    generation,
                    video,
                    area,
                } => {
                    let fallback = Event::ProcessingFailed {
                        generation,
                        error: TASK_PANICKED.to_string(),
                    };
                    spawn_guarded(tx.clone(), fallback, async move {
                        let event = match run_pipeline(&services, &tx, generation, &video, area).await {
                            Ok(frame) => Event::Processed { generation, frame },
                            Err(e) => Event::ProcessingFailed {
                                generation,
                                error: e.to_string(),
                            },
                        };
                        let _ = tx.send(event).await;
                    });
                }
                Effect::FetchTips { epoch } => {
                    let fallback = Event::TipsLoaded {
                        epoch,
                        text: TIPS_FAILED.to_string(),
                    };
                    spawn_guarded(tx.clone(), fallback, async move {
                        let text = match services.ai.tips().await {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "failed to fetch tips");
                                TIPS_FAILED.to_string()
                            }
                        };
                        let _ = tx.send(Event::TipsLoaded { epoch, text }).await;
                    });
                }
            }
        }
    }

    /// Stops the ticker once the screen that started it is gone.
    fn sync_ticker(&mut self) {
        let current = self.workflow.generation();
        if self.ticker.as_ref().is_some_and(|(owner, _)| *owner != current) {
            if let Some((owner, handle)) = self.ticker.take() {
                debug!(generation = owner, "stopping progress ticker");
                handle.abort();
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.ticker.take() {
            handle.abort();
        }
    }
}

/// Spawns `task`, sending `fallback` if it panics so the waiting screen
/// still gets an answer.
fn spawn_guarded<F>(tx: mpsc::Sender<Event>, fallback: Event, task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
            warn!(?fallback, "background task panicked");
            let _ = tx.send(fallback).await;
        }
    })
}

/// Waits for both detection halves. Fails if either one fails.
pub async fn join_detection<A, V>(audio: A, visual: V) -> Result<Detection>
where
    A: Future<Output = Result<bool>>,
    V: Future<Output = Result<Option<Area>>>,
{
    let (audio, visual) = futures::join!(audio, visual);
    Ok(Detection {
        audio_watermark: audio?,
        area: visual?,
    })
}

async fn detect(services: &Services, input: &VideoInput, video: Option<&Path>, link_delay: Duration) -> Result<Detection> {
    join_detection(
        services.audio.analyze(input),
        detect_visual(services, input, video, link_delay),
    )
    .await
}

async fn detect_visual(
    services: &Services,
    input: &VideoInput,
    video: Option<&Path>,
    link_delay: Duration,
) -> Result<Option<Area>> {
    match (input, video) {
        (VideoInput::Link(_), _) => {
            time::sleep(link_delay).await;
            Ok(Some(LINK_AREA))
        }
        (VideoInput::Demo(_), _) => Ok(Some(DEMO_AREA)),
        (VideoInput::File { .. }, Some(video)) => {
            let frame = ImageProcessor::extract_frame(services.frames.as_ref(), video).await?;
            services.ai.detect_area(&frame).await
        }
        (VideoInput::File { url, .. }, None) => Err(AppError::frame(format!("{} has no local file", url))),
    }
}

async fn report(tx: &mpsc::Sender<Event>, generation: u64, stage: Stage) {
    let _ = tx
        .send(Event::Progress {
            generation,
            percent: stage.percent(),
            message: stage.message().to_string(),
        })
        .await;
}

/// Extract, mark, inpaint. Steps run strictly one after another.
async fn run_pipeline(
    services: &Services,
    tx: &mpsc::Sender<Event>,
    generation: u64,
    video: &Path,
    area: Area,
) -> Result<Option<Vec<u8>>> {
    info!(generation, video = %video.display(), "starting removal pipeline");

    report(tx, generation, Stage::Extracting).await;
    let frame = ImageProcessor::extract_frame(services.frames.as_ref(), video).await?;

    report(tx, generation, Stage::Marking).await;
    let marked = tokio::task::spawn_blocking(move || ImageProcessor::mark_area(&frame, &area))
        .await
        .map_err(|e| AppError::image(format!("marking task failed: {}", e)))??;

    report(tx, generation, Stage::Inpainting).await;
    let clean = services.ai.inpaint(&marked).await?;

    report(tx, generation, Stage::Finalizing).await;
    if clean.is_none() {
        warn!(generation, "AI returned no image, preview falls back to blur");
    }
    report(tx, generation, Stage::Done).await;
    Ok(clean)
}

async fn run_ticker(tx: mpsc::Sender<Event>, generation: u64, messages: &'static [&'static str], period: Duration) {
    let mut progress = SimulatedProgress::new(messages);
    let mut interval = time::interval_at(Instant::now() + period, period);
    loop {
        interval.tick().await;
        let event = match progress.tick() {
            Tick::Advanced { percent, message } => Event::Progress {
                generation,
                percent,
                message: message.to_string(),
            },
            Tick::Finished => Event::Processed {
                generation,
                frame: None,
            },
        };
        let finished = matches!(event, Event::Processed { .. });
        if tx.send(event).await.is_err() || finished {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiAssistant;
    use crate::media::FfmpegFrameSource;
    use crate::services::{SimulatedAudioAnalyzer, TIPS_UNAVAILABLE};
    use crate::workflow::LaunchMode;

    fn offline_services() -> Services {
        Services {
            ai: Arc::new(GeminiAssistant::unavailable()),
            frames: Arc::new(FfmpegFrameSource::new()),
            audio: Arc::new(SimulatedAudioAnalyzer::default()),
        }
    }

    fn demo_session() -> Session {
        Session::new(Workflow::new(LaunchMode::Demo, "demo.mp4"), offline_services())
    }

    #[tokio::test]
    async fn join_fails_if_either_side_fails() {
        let area = Some(Area::new(1.0, 2.0, 30.0, 40.0));
        let both = join_detection(async { Ok::<_, AppError>(true) }, async { Ok::<_, AppError>(area) })
            .await
            .unwrap();
        assert_eq!(
            both,
            Detection {
                audio_watermark: true,
                area,
            }
        );

        let audio_failed = join_detection(
            async { Err::<bool, _>(AppError::Unknown("mic".into())) },
            async { Ok::<_, AppError>(area) },
        )
        .await;
        assert!(audio_failed.is_err());

        let visual_failed = join_detection(
            async { Ok::<_, AppError>(false) },
            async { Err::<Option<Area>, _>(AppError::frame("seek")) },
        )
        .await;
        assert!(visual_failed.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn demo_runs_the_ticker_to_a_frameless_result() {
        let mut session = demo_session();
        let started = Instant::now();
        session.confirm_area().unwrap();
        session.settle().await;

        assert!(started.elapsed() >= Duration::from_millis(100 * 120));
        let Screen::Result(outcome) = session.screen() else {
            panic!("expected result, got {}", session.screen().name());
        };
        assert_eq!(outcome.processed_frame, None);
        assert_eq!(session.workflow().download_artifact(), None);

        session.wait_for_tips().await;
        assert_eq!(session.workflow().tips(), &Tips::Ready(vec![TIPS_UNAVAILABLE.to_string()]));
    }

    #[tokio::test(start_paused = true)]
    async fn leaving_processing_stops_the_ticker() {
        let mut session = demo_session();
        session.confirm_area().unwrap();
        for _ in 0..5 {
            session.next_event().await;
        }
        session.back().unwrap();
        assert!(session.ticker.is_none());
        assert_eq!(session.screen().name(), "DEMO");

        // drain whatever was queued before the abort
        while session.events_rx.try_recv().is_ok() {}
        time::sleep(Duration::from_secs(30)).await;
        while let Ok(event) = session.events_rx.try_recv() {
            assert!(
                matches!(event, Event::TipsLoaded { .. }),
                "ticker still running: {event:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn link_detection_is_simulated() {
        let mut session = Session::new(Workflow::new(LaunchMode::Standard, "demo.mp4"), offline_services());
        session.select_action(Mode::Remove).unwrap();
        session.submit_link("https://example.com/v/1").unwrap();
        let started = Instant::now();
        session.settle().await;

        assert!(started.elapsed() >= Duration::from_millis(2500));
        let Screen::SelectArea(step) = session.screen() else {
            panic!("expected area selection");
        };
        assert_eq!(step.editor.selection(), Some(LINK_AREA));
        assert_eq!(session.workflow().audio_watermark(), Some(false));
    }

    struct PanickingAudio;

    #[async_trait::async_trait]
    impl AudioAnalyzer for PanickingAudio {
        async fn analyze(&self, _input: &VideoInput) -> Result<bool> {
            panic!("audio decoder crashed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_detection_still_settles() {
        let services = Services {
            audio: Arc::new(PanickingAudio),
            ..offline_services()
        };
        let mut session = Session::new(Workflow::new(LaunchMode::Standard, "demo.mp4"), services);
        session.select_action(Mode::Remove).unwrap();
        session.submit_link("https://example.com/v/1").unwrap();
        session.settle().await;

        let Screen::SelectArea(step) = session.screen() else {
            panic!("expected area selection, got {}", session.screen().name());
        };
        assert_eq!(step.detection_error.as_deref(), Some(crate::workflow::DETECTION_FAILED));
        assert_eq!(step.editor.selection(), None);
    }

    #[tokio::test]
    async fn bad_link_is_shown_on_the_upload_screen() {
        let mut session = Session::new(Workflow::new(LaunchMode::Standard, "demo.mp4"), offline_services());
        assert!(session.submit_link("https://example.com").is_err());
        session.select_action(Mode::Add).unwrap();
        let err = session.submit_link("bear").unwrap_err();
        assert!(matches!(err, AppError::Upload(UploadError::InvalidLink)));
        assert_eq!(
            session.screen(),
            &Screen::Upload {
                mode: Mode::Add,
                error: Some("Please enter a valid video link.".into()),
            }
        );
    }
}
