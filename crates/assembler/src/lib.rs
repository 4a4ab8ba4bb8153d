mod error;
mod runtime;

pub mod actor;
pub mod config;
pub mod dispatcher;
pub mod events;
pub mod reorder;
pub mod state;
pub mod stitcher;

pub use actor::{AssemblerHandle, Assembly, AssemblyParams, spawn_assembler};
pub use config::AssemblyConfig;
pub use dispatcher::{LaneState, SegmentDispatcher};
pub use error::*;
pub use events::*;
pub use reorder::{FragmentReorderBuffer, Flushed, ReadySegment};
pub use runtime::AssemblerRuntime;
pub use state::{Effect, PipelineState};
pub use stitcher::{AudioStitcher, StitchedAudio, TimelineBlock};
