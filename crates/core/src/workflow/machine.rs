//! The workflow state machine.
//!
//! [`Workflow`] is synchronous and does no I/O. Transitions return the
//! [`Effect`]s the caller has to run, and the results of those come back as
//! [`Event`]s through [`Workflow::apply`]. Every effect carries the token of
//! the screen that started it, so a result that arrives after the user moved
//! on is dropped instead of applied.

use super::progress::{ADD_MESSAGES, INITIAL_MESSAGE, REMOVE_MESSAGES};
use super::state::{AreaStep, EditorStep, Job, LaunchMode, Mode, Outcome, Processing, Screen, Tips};
use crate::classifier;
use crate::error::{AppError, Result, UploadError};
use crate::geometry::Area;
use crate::media::{VideoInput, VideoRegistry, VideoUrl};
use crate::selection::SelectionEditor;
use crate::services::split_tips;
use crate::upload::FileCandidate;
use crate::watermark::WatermarkConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;

/// Area preselected on the demo screen.
pub const DEMO_AREA: Area = Area {
    x: 75.0,
    y: 78.0,
    width: 22.0,
    height: 12.0,
};

/// Shown next to the area editor when detection failed.
pub const DETECTION_FAILED: &str = "AI detection failed. Please select the area manually.";

/// Joined result of the audio and visual detection tasks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub audio_watermark: bool,
    pub area: Option<Area>,
}

/// Background work requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Run audio and visual detection. `video` is set for local files.
    Detect {
        generation: u64,
        input: VideoInput,
        video: Option<PathBuf>,
    },
    /// Drive the processing screen with the fake ticker.
    Simulate {
        generation: u64,
        messages: &'static [&'static str],
    },
    /// Extract, mark and inpaint a frame of `video`.
    Pipeline {
        generation: u64,
        video: PathBuf,
        area: Area,
    },
    FetchTips { epoch: u64 },
}

/// Completion of an [`Effect`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Detected {
        generation: u64,
        result: std::result::Result<Detection, String>,
    },
    Progress {
        generation: u64,
        percent: u8,
        message: String,
    },
    Processed {
        generation: u64,
        frame: Option<Vec<u8>>,
    },
    ProcessingFailed {
        generation: u64,
        error: String,
    },
    TipsLoaded { epoch: u64, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    screen: Screen,
    /// Bumped on every screen change.
    generation: u64,
    /// Bumped on every reset.
    epoch: u64,
    registry: VideoRegistry,
    demo_video: VideoUrl,
    audio_watermark: Option<bool>,
    watermark: WatermarkConfig,
    tips: Tips,
}

impl Workflow {
    /// Creates a workflow on its launch screen. `demo_video` is registered
    /// as the shared demo asset.
    pub fn new(launch: LaunchMode, demo_video: impl Into<PathBuf>) -> Self {
        let mut registry = VideoRegistry::new();
        let demo_video = registry.register_shared(demo_video);
        let screen = Self::launch_screen(launch, &demo_video);
        Self {
            screen,
            generation: 0,
            epoch: 0,
            registry,
            demo_video,
            audio_watermark: None,
            watermark: WatermarkConfig::default(),
            tips: Tips::NotLoaded,
        }
    }

    fn launch_screen(launch: LaunchMode, demo_video: &VideoUrl) -> Screen {
        match launch {
            LaunchMode::Demo => Screen::Demo(AreaStep::new(
                VideoInput::Demo(demo_video.clone()),
                Some(DEMO_AREA),
            )),
            LaunchMode::Standard => Screen::SelectAction,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn mode(&self) -> Option<Mode> {
        self.screen.mode()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn tips(&self) -> &Tips {
        &self.tips
    }

    pub fn audio_watermark(&self) -> Option<bool> {
        self.audio_watermark
    }

    pub fn registry(&self) -> &VideoRegistry {
        &self.registry
    }

    /// Resolves the local file behind an input, if it has one.
    pub fn resolve(&self, input: &VideoInput) -> Option<&Path> {
        input.video_url().and_then(|url| self.registry.resolve(url))
    }

    /// The file offered for download on the result screen.
    ///
    /// Only local uploads have one, and it is the original file.
    pub fn download_artifact(&self) -> Option<&Path> {
        match &self.screen {
            Screen::Result(outcome) => match outcome.job.input() {
                input @ VideoInput::File { .. } => self.resolve(input),
                _ => None,
            },
            _ => None,
        }
    }

    /// The area editor, on screens that have one.
    pub fn area_editor(&mut self) -> Option<&mut SelectionEditor> {
        match &mut self.screen {
            Screen::Demo(step) | Screen::SelectArea(step) => Some(&mut step.editor),
            _ => None,
        }
    }

    /// The watermark settings being edited, on the editor screen.
    pub fn watermark_editor(&mut self) -> Option<&mut WatermarkConfig> {
        match &mut self.screen {
            Screen::Editor(step) => Some(&mut step.config),
            _ => None,
        }
    }

    fn go(&mut self, next: Screen) {
        debug!(from = self.screen.name(), to = next.name(), "screen change");
        self.screen = next;
        self.generation += 1;
    }

    fn refuse(&self, action: &'static str) -> AppError {
        AppError::InvalidTransition {
            action,
            screen: self.screen.name(),
        }
    }

    fn release(&mut self, input: &VideoInput) {
        if let Some(url) = input.video_url() {
            self.registry.release(url);
        }
    }

    /// SELECT_ACTION -> UPLOAD.
    pub fn select_action(&mut self, mode: Mode) -> Result<()> {
        if !matches!(self.screen, Screen::SelectAction) {
            return Err(self.refuse("select_action"));
        }
        info!(%mode, "action selected");
        self.go(Screen::Upload { mode, error: None });
        Ok(())
    }

    fn upload_mode(&self, action: &'static str) -> Result<Mode> {
        match &self.screen {
            Screen::Upload { mode, .. } => Ok(*mode),
            _ => Err(self.refuse(action)),
        }
    }

    /// Accepts a file that already passed validation.
    pub fn submit_file(&mut self, candidate: &FileCandidate) -> Result<Vec<Effect>> {
        let mode = self.upload_mode("submit_file")?;
        let url = self.registry.register(&candidate.path);
        info!(%url, size = candidate.size, "video accepted");
        let input = VideoInput::File {
            url,
            size: candidate.size,
        };
        Ok(self.enter_input(mode, input, Some(candidate.path.clone())))
    }

    /// Accepts a pasted link. Nothing is fetched from it.
    pub fn submit_link(&mut self, link: Url) -> Result<Vec<Effect>> {
        let mode = self.upload_mode("submit_link")?;
        info!(%link, "link accepted");
        Ok(self.enter_input(mode, VideoInput::Link(link), None))
    }

    fn enter_input(&mut self, mode: Mode, input: VideoInput, video: Option<PathBuf>) -> Vec<Effect> {
        match mode {
            Mode::Add => {
                let config = self.watermark.clone();
                self.go(Screen::Editor(EditorStep { input, config }));
                Vec::new()
            }
            Mode::Remove => {
                self.audio_watermark = None;
                self.go(Screen::Detecting {
                    input: input.clone(),
                });
                vec![Effect::Detect {
                    generation: self.generation,
                    input,
                    video,
                }]
            }
        }
    }

    /// Shows a validation failure on the upload screen. The screen itself
    /// does not change.
    pub fn reject_upload(&mut self, rejection: &UploadError) -> Result<()> {
        match &mut self.screen {
            Screen::Upload { error, .. } => {
                warn!(%rejection, "upload rejected");
                *error = Some(rejection.to_string());
                Ok(())
            }
            _ => Err(self.refuse("reject_upload")),
        }
    }

    /// DEMO / SELECT_WATERMARK_AREA -> PROCESSING with the confirmed area.
    pub fn confirm_area(&mut self) -> Result<Vec<Effect>> {
        let (input, area) = match &self.screen {
            Screen::Demo(step) | Screen::SelectArea(step) => {
                let area = step.editor.confirm().ok_or(AppError::EmptySelection)?;
                (step.input.clone(), area)
            }
            _ => return Err(self.refuse("confirm_area")),
        };
        info!(?area, "area confirmed");
        self.enter_processing(Job::Remove { input, area })
    }

    /// EDITOR -> PROCESSING with the edited watermark settings.
    pub fn apply_watermark(&mut self) -> Result<Vec<Effect>> {
        let Screen::Editor(step) = &self.screen else {
            return Err(self.refuse("apply_watermark"));
        };
        let (input, config) = (step.input.clone(), step.config.clone());
        self.watermark = config.clone();
        self.enter_processing(Job::Add { input, config })
    }

    fn enter_processing(&mut self, job: Job) -> Result<Vec<Effect>> {
        let pipeline = match &job {
            Job::Remove { input, area } if !job.is_simulated() => {
                let video = self
                    .resolve(input)
                    .ok_or_else(|| AppError::Unknown("video reference was released".into()))?
                    .to_path_buf();
                Some((video, *area))
            }
            _ => None,
        };
        let messages = match job.mode() {
            Mode::Remove => REMOVE_MESSAGES,
            Mode::Add => ADD_MESSAGES,
        };

        self.go(Screen::Processing(Processing {
            job,
            progress: 0,
            message: INITIAL_MESSAGE.to_string(),
        }));

        let generation = self.generation;
        let mut effects = vec![match pipeline {
            Some((video, area)) => Effect::Pipeline {
                generation,
                video,
                area,
            },
            None => Effect::Simulate {
                generation,
                messages,
            },
        }];
        if self.tips == Tips::NotLoaded {
            self.tips = Tips::Loading;
            effects.push(Effect::FetchTips { epoch: self.epoch });
        }
        Ok(effects)
    }

    /// Goes back one logical step.
    ///
    /// Leaving a step that owns a local upload releases it. Back on the demo
    /// screen is a reset; RESULT has no back.
    pub fn back(&mut self) -> Result<()> {
        let previous = match &self.screen {
            Screen::Upload { .. } => Screen::SelectAction,
            Screen::Editor(EditorStep { input, .. }) => {
                let input = input.clone();
                self.release(&input);
                Screen::Upload {
                    mode: Mode::Add,
                    error: None,
                }
            }
            Screen::Detecting { input } | Screen::SelectArea(AreaStep { input, .. }) => {
                let input = input.clone();
                self.release(&input);
                Screen::Upload {
                    mode: Mode::Remove,
                    error: None,
                }
            }
            Screen::Processing(Processing { job, .. }) => match job.clone() {
                Job::Remove {
                    input: input @ VideoInput::Demo(_),
                    area,
                } => Screen::Demo(AreaStep::new(input, Some(area))),
                Job::Remove { input, area } => Screen::SelectArea(AreaStep::new(input, Some(area))),
                Job::Add { input, config } => Screen::Editor(EditorStep { input, config }),
            },
            Screen::Demo(_) => {
                self.reset();
                return Ok(());
            }
            Screen::SelectAction | Screen::Result(_) => return Err(self.refuse("back")),
        };
        self.go(previous);
        Ok(())
    }

    /// Returns to SELECT_ACTION from anywhere.
    ///
    /// Releases the current upload, drops detection results, tips and
    /// watermark settings, and invalidates every outstanding effect.
    pub fn reset(&mut self) {
        if let Some(input) = self.screen.input().cloned() {
            self.release(&input);
        }
        self.audio_watermark = None;
        self.watermark = WatermarkConfig::default();
        self.tips = Tips::NotLoaded;
        self.epoch += 1;
        info!(epoch = self.epoch, "workflow reset");
        self.go(Screen::SelectAction);
    }

    /// Applies a background result. Returns `false` when it was stale and
    /// got dropped.
    pub fn apply(&mut self, event: Event) -> bool {
        match event {
            Event::TipsLoaded { epoch, text } => {
                if epoch != self.epoch || self.tips != Tips::Loading {
                    debug!(epoch, current = self.epoch, "dropping stale tips");
                    return false;
                }
                self.tips = Tips::Ready(split_tips(&text));
                true
            }
            Event::Detected { generation, result } => {
                if !self.is_current(generation) {
                    return false;
                }
                let Screen::Detecting { input } = &self.screen else {
                    return false;
                };
                let input = input.clone();
                let mut step = AreaStep::new(input, None);
                match result {
                    Ok(detection) => {
                        info!(area = ?detection.area, audio = detection.audio_watermark, "detection finished");
                        self.audio_watermark = Some(detection.audio_watermark);
                        step = AreaStep::new(step.input, detection.area);
                    }
                    Err(error) => {
                        warn!(%error, "detection failed");
                        self.audio_watermark = None;
                        step.detection_error = Some(DETECTION_FAILED.to_string());
                    }
                }
                self.go(Screen::SelectArea(step));
                true
            }
            Event::Progress {
                generation,
                percent,
                message,
            } => {
                if !self.is_current(generation) {
                    return false;
                }
                let Screen::Processing(processing) = &mut self.screen else {
                    return false;
                };
                processing.progress = processing.progress.max(percent.min(100));
                processing.message = message;
                true
            }
            Event::Processed { generation, frame } => {
                if !self.is_current(generation) {
                    return false;
                }
                let Screen::Processing(processing) = &self.screen else {
                    return false;
                };
                if frame.is_none() {
                    debug!("finished without a processed frame");
                }
                let audio_watermark = match processing.job {
                    Job::Remove { .. } => self.audio_watermark,
                    Job::Add { .. } => None,
                };
                let outcome = Outcome {
                    job: processing.job.clone(),
                    processed_frame: frame,
                    audio_watermark,
                };
                self.go(Screen::Result(outcome));
                true
            }
            Event::ProcessingFailed { generation, error } => {
                if !self.is_current(generation) {
                    return false;
                }
                let Screen::Processing(processing) = &self.screen else {
                    return false;
                };
                let message = classifier::user_facing(&error).to_string();
                let next = match processing.job.clone() {
                    Job::Remove { input, area } => {
                        let mut step = AreaStep::new(input, Some(area));
                        step.processing_error = Some(message);
                        Screen::SelectArea(step)
                    }
                    Job::Add { input, config } => Screen::Editor(EditorStep { input, config }),
                };
                self.go(next);
                true
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation {
            debug!(generation, current = self.generation, "dropping stale result");
            return false;
        }
        true
    }
}
