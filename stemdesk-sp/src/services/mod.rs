//! Pipeline stages and workspace services

pub mod artifact_store;
pub mod audio_io;
pub mod component_router;
pub mod enhancement;
pub mod merger;
pub mod normalizer;
pub mod segmenter;
pub mod speaker_splitter;

pub use artifact_store::{ArtifactStore, StoreError};
pub use audio_io::{AudioIoError, AudioLoader};
pub use component_router::{ChunkSeparation, ComponentAccumulator, ComponentRouter};
pub use enhancement::{EnhancementError, EnhancementOrchestrator};
pub use merger::MergeError;
pub use normalizer::{NormalizeError, Normalizer};
pub use segmenter::{SegmentError, Segmentation, Segmenter};
pub use speaker_splitter::{SpeakerSplitError, SpeakerSplitter};
