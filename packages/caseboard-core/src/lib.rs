pub mod api;
pub mod config;
pub mod content_types;
pub mod dispatcher;
pub mod draft;
pub mod engine;
pub mod error;
pub mod export;
pub mod locator;
pub mod overlay;
pub mod persister;
pub mod pin;
pub mod render;
pub mod session;
pub mod store;
pub mod types;

pub use api::{ApiError, BoardApi};
pub use config::SyncSettings;
pub use engine::BoardEngine;
pub use error::BoardError;
pub use persister::FlushStatus;
pub use pin::{PinCandidate, PinTarget};
pub use render::RenderedBoard;
pub use session::{BoardSession, CloseReport};
