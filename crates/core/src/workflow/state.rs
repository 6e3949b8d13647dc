//! Screens of the workflow and the payload each one owns.

use crate::geometry::Area;
use crate::media::VideoInput;
use crate::selection::SelectionEditor;
use crate::watermark::WatermarkConfig;
use std::fmt;

/// What the user wants to do with the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Remove,
    Add,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Remove => "remove",
            Mode::Add => "add",
        })
    }
}

/// Which screen the app opens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaunchMode {
    /// Opens on the canned demo, area preselected.
    Demo,
    #[default]
    Standard,
}

/// Payload of the area selection screens (DEMO and SELECT_WATERMARK_AREA).
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStep {
    pub input: VideoInput,
    pub editor: SelectionEditor,
    /// Set when detection failed; the user has to select the area by hand.
    pub detection_error: Option<String>,
    /// Classified message of the last failed processing run.
    pub processing_error: Option<String>,
}

impl AreaStep {
    pub fn new(input: VideoInput, area: Option<Area>) -> Self {
        Self {
            input,
            editor: SelectionEditor::new(area),
            detection_error: None,
            processing_error: None,
        }
    }
}

/// Payload of the add-mode editor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorStep {
    pub input: VideoInput,
    pub config: WatermarkConfig,
}

/// Work handed to the processing screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Remove { input: VideoInput, area: Area },
    Add { input: VideoInput, config: WatermarkConfig },
}

impl Job {
    pub fn mode(&self) -> Mode {
        match self {
            Job::Remove { .. } => Mode::Remove,
            Job::Add { .. } => Mode::Add,
        }
    }

    pub fn input(&self) -> &VideoInput {
        match self {
            Job::Remove { input, .. } | Job::Add { input, .. } => input,
        }
    }

    /// Only removal on a local file runs the real pipeline.
    pub fn is_simulated(&self) -> bool {
        !matches!(
            self,
            Job::Remove {
                input: VideoInput::File { .. },
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Processing {
    pub job: Job,
    pub progress: u8,
    pub message: String,
}

/// What the result screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub job: Job,
    /// Inpainted still, if the service returned one.
    pub processed_frame: Option<Vec<u8>>,
    /// Whether the audio analysis flagged a watermark. `None` when detection
    /// never ran.
    pub audio_watermark: Option<bool>,
}

/// The current screen and its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Demo(AreaStep),
    SelectAction,
    Upload { mode: Mode, error: Option<String> },
    Editor(EditorStep),
    Detecting { input: VideoInput },
    SelectArea(AreaStep),
    Processing(Processing),
    Result(Outcome),
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Demo(_) => "DEMO",
            Screen::SelectAction => "SELECT_ACTION",
            Screen::Upload { .. } => "UPLOAD",
            Screen::Editor(_) => "EDITOR",
            Screen::Detecting { .. } => "DETECTING_WATERMARK",
            Screen::SelectArea(_) => "SELECT_WATERMARK_AREA",
            Screen::Processing(_) => "PROCESSING",
            Screen::Result(_) => "RESULT",
        }
    }

    /// True while a background task owns the screen.
    pub fn is_busy(&self) -> bool {
        matches!(self, Screen::Detecting { .. } | Screen::Processing(_))
    }

    /// The mode the screen belongs to, if one was chosen yet.
    pub fn mode(&self) -> Option<Mode> {
        match self {
            Screen::SelectAction => None,
            Screen::Upload { mode, .. } => Some(*mode),
            Screen::Editor(_) => Some(Mode::Add),
            Screen::Demo(_) | Screen::Detecting { .. } | Screen::SelectArea(_) => Some(Mode::Remove),
            Screen::Processing(processing) => Some(processing.job.mode()),
            Screen::Result(outcome) => Some(outcome.job.mode()),
        }
    }

    pub fn input(&self) -> Option<&VideoInput> {
        match self {
            Screen::SelectAction | Screen::Upload { .. } => None,
            Screen::Demo(step) | Screen::SelectArea(step) => Some(&step.input),
            Screen::Editor(step) => Some(&step.input),
            Screen::Detecting { input } => Some(input),
            Screen::Processing(processing) => Some(processing.job.input()),
            Screen::Result(outcome) => Some(outcome.job.input()),
        }
    }
}

/// AI tips for the processing and result screens.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Tips {
    #[default]
    NotLoaded,
    Loading,
    Ready(Vec<String>),
}
