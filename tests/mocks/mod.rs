pub mod recording_registry;

pub use recording_registry::{RecordingRegistry, RejectingRegistry};
