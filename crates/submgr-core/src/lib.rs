pub mod address;
pub mod config;
pub mod error;
pub mod policy;
pub mod types;

pub use address::{Endpoint, resolve};
pub use config::SubmgrConfig;
pub use error::LinkError;
pub use policy::{AuthorizationPolicy, LevelPolicy};
pub use types::*;
pub use uuid::Uuid;
