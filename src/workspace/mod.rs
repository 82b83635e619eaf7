pub mod git;
pub mod publisher;

pub use publisher::{GitSubtreePublisher, SubtreePublisher};

#[cfg(test)]
pub use publisher::RecordingPublisher;
