pub mod app;
pub mod audio_graph;
pub mod ipc;
pub mod playback_engine;

pub use app::*;
pub use audio_graph::*;
pub use ipc::*;
pub use playback_engine::*;
