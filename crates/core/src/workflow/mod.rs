//! The staged remove/add workflow.
//!
//! - [`state`]: the screens and what each one holds
//! - [`machine`]: the synchronous transitions
//! - [`progress`]: status messages and the fake ticker
//! - [`session`]: the async driver that runs background work

pub mod machine;
pub mod progress;
pub mod session;
pub mod state;

pub use machine::{DEMO_AREA, DETECTION_FAILED, Detection, Effect, Event, Workflow};
pub use session::{LINK_AREA, Services, Session, Timings, join_detection};
pub use state::{AreaStep, EditorStep, Job, LaunchMode, Mode, Outcome, Processing, Screen, Tips};
