//! Progress reporting for the processing screen.

/// Status messages for the simulated remove run, spread evenly over 0-100%.
pub const REMOVE_MESSAGES: &[&str] = &[
    "Calibrating bear-vision AI...",
    "Analyzing user-defined watermark area...",
    "Isolating watermark layer...",
    "Generating inpainting mask...",
    "Reconstructing background with generative fill...",
    "Finalizing render and compressing...",
];

/// Status messages for the simulated add run.
pub const ADD_MESSAGES: &[&str] = &[
    "Preparing video canvas...",
    "Calibrating watermark position...",
    "Rendering image layer...",
    "Applying opacity and size filters...",
    "Merging layers...",
    "Finalizing and compressing...",
];

pub const INITIAL_MESSAGE: &str = "Initializing...";
pub const FINAL_MESSAGE: &str = "Finalizing...";

/// Message shown at `percent` for an evenly spread message list.
pub fn message_for(percent: u8, messages: &[&'static str]) -> &'static str {
    let index = usize::from(percent) * messages.len() / 100;
    messages.get(index).copied().unwrap_or(FINAL_MESSAGE)
}

/// Steps of the real removal pipeline, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Marking,
    Inpainting,
    Finalizing,
    Done,
}

impl Stage {
    /// Progress reported when the stage begins.
    pub fn percent(self) -> u8 {
        match self {
            Stage::Extracting => 0,
            Stage::Marking => 15,
            Stage::Inpainting => 30,
            Stage::Finalizing => 85,
            Stage::Done => 100,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Stage::Extracting => "Extracting video frame...",
            Stage::Marking => "Marking watermark area...",
            Stage::Inpainting => "Asking AI to remove watermark...",
            Stage::Finalizing | Stage::Done => FINAL_MESSAGE,
        }
    }
}

/// One step of the simulated ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Advanced { percent: u8, message: &'static str },
    Finished,
}

/// Fixed-cadence fake progress: +1% per tick until 100%.
#[derive(Debug, Clone)]
pub struct SimulatedProgress {
    percent: u8,
    messages: &'static [&'static str],
}

impl SimulatedProgress {
    pub fn new(messages: &'static [&'static str]) -> Self {
        Self {
            percent: 0,
            messages,
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn tick(&mut self) -> Tick {
        if self.percent >= 100 {
            return Tick::Finished;
        }
        self.percent += 1;
        if self.percent >= 100 {
            return Tick::Finished;
        }
        Tick::Advanced {
            percent: self.percent,
            message: message_for(self.percent, self.messages),
        }
    }
}
