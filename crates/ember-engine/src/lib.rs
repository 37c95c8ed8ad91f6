//! Ember Engine -- fixed-timestep frame driver for the Ember ECS.
//!
//! This crate builds on [`ember_ecs`] to provide the main loop: a
//! [`FrameLoop`](frame::FrameLoop) that reconciles the registry once per
//! frame, runs named stages in a fixed order, and advances simulation time.
//!
//! # Quick Start
//!
//! ```
//! use ember_engine::prelude::*;
//!
//! let config = EngineConfig::from_json(r#"{ "frame": { "max_frames": 100 } }"#).unwrap();
//! let mut frames = FrameLoop::from_config(config).unwrap();
//!
//! frames.add_stage("example", |_registry, _ctx| {
//!     // game logic here
//!     Ok(())
//! }).unwrap();
//!
//! assert_eq!(frames.run().unwrap(), 100);
//! ```

#![deny(unsafe_code)]

pub mod frame;

use ember_ecs::registry::{Registry, RegistryConfig};
use ember_ecs::EcsError;
use serde::{Deserialize, Serialize};

use frame::{FrameConfig, FrameLoop};

/// Re-export the ECS crate for convenience.
pub use ember_ecs;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An ECS operation failed outside of a stage.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// A stage returned an error; the rest of the frame was skipped.
    #[error("stage '{name}' failed: {source}")]
    Stage {
        name: String,
        #[source]
        source: EcsError,
    },

    /// A stage name was registered twice.
    #[error("stage '{name}' is already registered")]
    DuplicateStage { name: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Combined registry and frame loop configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub registry: RegistryConfig,
    pub frame: FrameConfig,
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document. Missing fields take
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.frame.validate()?;
        Ok(config)
    }
}

impl FrameLoop {
    /// Build a fresh registry and frame loop from one configuration.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        FrameLoop::new(Registry::with_config(config.registry), config.frame)
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use ember_ecs::prelude::*;

    pub use crate::frame::{FrameConfig, FrameContext, FrameDiagnostics, FrameLoop, StageFn};
    pub use crate::{EngineConfig, EngineError};
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
