pub mod app;
pub mod config;
pub mod debounce;
pub mod graph;
pub mod interaction;
pub mod layout;
pub mod logging;
pub mod models;
pub mod ranker;
pub mod service;
pub mod store;
pub mod utils;

pub use app::{AppContext, EdgeView, Frame, TagView};
pub use config::Config;
pub use graph::{Graph, GraphError};
pub use interaction::{Interaction, InteractionState, PointerEvent};
pub use layout::{Hold, LayoutConfig, LayoutEngine};
pub use models::{EntryId, EntryNode, EntryRecord, Snapshot, TagId, TagNode, TagRecord, Vector};
pub use ranker::{RankedEntry, Ranker};
pub use service::{KnowledgeBase, ServiceError};
pub use store::{HttpStore, HttpStoreBuilder, InMemoryStore, Store, StoreError};
