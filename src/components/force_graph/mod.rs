//! Motion graph engine: data model, layout, centrality, density overlays,
//! interaction and canvas rendering.

mod centrality;
mod component;
mod config;
mod density;
mod error;
mod events;
mod groups;
mod interaction;
pub mod layout;
mod model;
mod render;
mod scene;
mod settings;
mod state;
mod types;
mod viewport;
#[cfg(not(target_arch = "wasm32"))]
mod worker;

pub use centrality::{CentralityJob, CentralityScores, compute as compute_centrality};
pub use component::ForceGraphCanvas;
pub use config::{DensityConfig, EngineConfig, Palette};
pub use density::{ContourBand, DensityCache, DensityContours, DensityEstimator};
pub use error::{DataIssue, EngineError};
pub use events::{EngineCommand, EngineEvent, EventBus, SubscriptionId, ViewAction};
pub use groups::{Group, GroupFile, GroupStore, NodeGroup};
pub use interaction::{InteractionController, PointerRelease};
pub use model::{Adjacency, GraphModel, GraphView};
pub use render::Canvas2dRenderer;
pub use scene::{Frame, RecordedFrame, RenderEngine, SceneRecorder, build_frame};
pub use settings::{FilterChange, Settings};
pub use state::{EngineStatus, GraphEngine, LayoutRequest, sanitize_file_name};
pub use types::{GraphData, GraphLink, GraphNode, Link, Node, NodeCentrality, NodeKind, Point};
pub use viewport::{BoundingBox, ViewTransform, Viewport};
#[cfg(not(target_arch = "wasm32"))]
pub use worker::CentralityWorker;
