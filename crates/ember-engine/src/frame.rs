//! Fixed-timestep frame loop over an ECS [`Registry`].
//!
//! The [`FrameLoop`] drives the simulation forward. Each frame:
//!
//! 1. [`Registry::update`] reconciles pending entity creations, removals and
//!    signature changes, so every system sees a settled member list.
//! 2. All registered stages run in declaration order, each receiving mutable
//!    access to the registry and the [`FrameContext`] for this frame.
//! 3. The frame counter and elapsed time advance.
//!
//! Entities created or removed by a stage stay pending until the next frame's
//! reconciliation. Entities created before the first frame are visible to the
//! stages of frame 0.
//!
//! # Example
//!
//! ```
//! use ember_engine::frame::{FrameConfig, FrameLoop};
//! use ember_ecs::prelude::*;
//!
//! let config = FrameConfig { fixed_dt: 1.0 / 60.0, ..Default::default() };
//! let mut frames = FrameLoop::new(Registry::new(), config).unwrap();
//!
//! frames
//!     .add_stage("spawn", |registry, _ctx| {
//!         registry.create_entity();
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! frames.run_frames(10).unwrap();
//! assert_eq!(frames.frame_count(), 10);
//! assert_eq!(frames.registry().entity_count(), 10);
//! ```

use std::time::{Duration, Instant};

use ember_ecs::registry::{ReconcileReport, Registry};
use ember_ecs::EcsError;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, trace};

use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Configuration for the fixed-timestep frame loop.
///
/// The `fixed_dt` is the duration in seconds of each frame. A value of
/// `1.0 / 60.0` gives 60 frames per second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Fixed time step in seconds per frame. Must be positive and finite.
    pub fixed_dt: f64,
    /// Frame budget for [`FrameLoop::run`]. `None` runs until stopped.
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    /// Defaults to 60 Hz (1/60 second per frame), unbounded.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_frames: None,
        }
    }
}

impl FrameConfig {
    /// Check that the configuration describes a runnable loop.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FrameContext
// ---------------------------------------------------------------------------

/// Per-frame values handed to every stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    /// Zero-based index of the frame being run.
    pub frame: u64,
    /// Fixed time step in seconds.
    pub dt: f64,
    /// Simulation time at the start of this frame, in seconds.
    pub elapsed: f64,
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Wall-clock time per stage (in order of execution).
    pub stage_times: Vec<(String, Duration)>,
    /// Total time for the frame (reconciliation + stages).
    pub total_time: Duration,
    /// Time spent in [`Registry::update`].
    pub reconcile_time: Duration,
    /// What the frame's reconciliation changed.
    pub reconcile: ReconcileReport,
}

// ---------------------------------------------------------------------------
// StageFn
// ---------------------------------------------------------------------------

/// A stage function run once per frame.
///
/// Stages usually forward to [`Registry::run_system`] so that a system can
/// iterate its members while mutating the registry.
pub type StageFn = fn(&mut Registry, &FrameContext) -> Result<(), EcsError>;

#[derive(Debug)]
struct Stage {
    name: String,
    func: StageFn,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// The fixed-timestep frame loop.
///
/// Owns the [`Registry`] and an ordered list of named stages. Stage order is
/// declaration order, and reconciliation happens exactly once per frame
/// before the first stage.
pub struct FrameLoop {
    registry: Registry,
    stages: Vec<Stage>,
    frame_counter: u64,
    config: FrameConfig,
    last_diagnostics: FrameDiagnostics,
}

impl FrameLoop {
    /// Create a new frame loop over `registry`.
    ///
    /// The frame counter starts at 0 and elapsed time at 0.0.
    pub fn new(registry: Registry, config: FrameConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            registry,
            stages: Vec::new(),
            frame_counter: 0,
            config,
            last_diagnostics: FrameDiagnostics::default(),
        })
    }

    /// Register a stage to be run each frame, after every stage already
    /// registered.
    pub fn add_stage(&mut self, name: &str, func: StageFn) -> Result<(), EngineError> {
        if self.stages.iter().any(|s| s.name == name) {
            return Err(EngineError::DuplicateStage {
                name: name.to_owned(),
            });
        }
        debug!(stage = name, "stage registered");
        self.stages.push(Stage {
            name: name.to_owned(),
            func,
        });
        Ok(())
    }

    /// Execute one frame.
    ///
    /// A failing stage aborts the rest of the frame; the frame counter does
    /// not advance and the error names the stage.
    pub fn frame(&mut self) -> Result<&FrameDiagnostics, EngineError> {
        let span = debug_span!("frame", frame = self.frame_counter);
        let _guard = span.enter();

        let frame_start = Instant::now();
        let ctx = FrameContext {
            frame: self.frame_counter,
            dt: self.config.fixed_dt,
            elapsed: self.elapsed(),
        };

        let reconcile_start = Instant::now();
        let reconcile = self.registry.update();
        let reconcile_time = reconcile_start.elapsed();

        let mut stage_times = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let stage_start = Instant::now();
            (stage.func)(&mut self.registry, &ctx).map_err(|source| EngineError::Stage {
                name: stage.name.clone(),
                source,
            })?;
            let took = stage_start.elapsed();
            trace!(stage = %stage.name, ?took, "stage finished");
            stage_times.push((stage.name.clone(), took));
        }

        self.frame_counter += 1;
        self.last_diagnostics = FrameDiagnostics {
            stage_times,
            total_time: frame_start.elapsed(),
            reconcile_time,
            reconcile,
        };
        debug!(
            entities = self.registry.entity_count(),
            total = ?self.last_diagnostics.total_time,
            "frame finished"
        );
        Ok(&self.last_diagnostics)
    }

    /// Run `count` frames in sequence, stopping at the first error.
    pub fn run_frames(&mut self, count: u64) -> Result<(), EngineError> {
        for _ in 0..count {
            self.frame()?;
        }
        Ok(())
    }

    /// Run frames until `stop` returns `true` for the registry or the
    /// configured `max_frames` is reached. Returns the number of frames run.
    ///
    /// `stop` is checked before each frame.
    pub fn run_until(&mut self, mut stop: impl FnMut(&Registry) -> bool) -> Result<u64, EngineError> {
        let mut ran = 0u64;
        while !self.budget_spent() && !stop(&self.registry) {
            self.frame()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// Run frames until the configured `max_frames` is reached.
    ///
    /// With no frame budget this only returns on a stage error.
    pub fn run(&mut self) -> Result<u64, EngineError> {
        self.run_until(|_| false)
    }

    fn budget_spent(&self) -> bool {
        self.config
            .max_frames
            .is_some_and(|max| self.frame_counter >= max)
    }

    // -- accessors ----------------------------------------------------------

    /// The number of frames executed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Simulation time in seconds, computed as `frame_count * fixed_dt`.
    pub fn elapsed(&self) -> f64 {
        self.frame_counter as f64 * self.config.fixed_dt
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry, for setup between frames.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Consume the loop and hand back its registry.
    pub fn into_registry(self) -> Registry {
        self.registry
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// The names of all registered stages, in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Diagnostics from the last completed frame.
    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

impl std::fmt::Debug for FrameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameLoop")
            .field("frame_counter", &self.frame_counter)
            .field("config", &self.config)
            .field("stages", &self.stage_names())
            .field("registry", &self.registry)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
