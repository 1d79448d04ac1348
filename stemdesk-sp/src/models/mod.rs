//! Domain types shared by the pipeline stages

mod artifacts;
mod audio;
mod component;
mod report;
mod scope;
mod speaker;

pub use artifacts::{EnhancedArtifact, MergedArtifact, NormalizedArtifact, Segment, WorkspaceEntry};
pub use audio::AudioAsset;
pub use component::{ComponentLabel, MissingComponents, StemSet, UnknownComponent};
pub use report::{ChunkFailure, PipelineReport, PipelineStage};
pub use scope::Scope;
pub use speaker::{InvalidSpeakerLabel, IntervalOrdering, SpeakerKey, SpeakerTrack, SpeakerTurn};
