//! Headless arena demo -- a player, waves of enemies, and projectiles.
//!
//! Enemies drift across the map and fire at the player; the player fires
//! back at the nearest enemy. Anything that leaves the map is destroyed,
//! except the player, who is clamped to the edge instead.
//!
//! Run with:
//!   cargo run --example headless_arena -p ember-engine
//!
//! Optional configuration (JSON, see `EngineConfig`):
//!   EMBER_CONFIG='{"frame":{"max_frames":1200}}' cargo run --example headless_arena -p ember-engine
//!
//! Set `RUST_LOG=debug` to watch every entity and membership change.

use anyhow::Context;
use ember_engine::prelude::*;
use tracing::{info, warn};

const MAP_WIDTH: f32 = 800.0;
const MAP_HEIGHT: f32 = 600.0;
const HIT_RADIUS: f32 = 12.0;
const WAVE_EVERY: u64 = 90;
const FIRE_EVERY: u64 = 20;

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    x: f32,
    y: f32,
}

impl Transform {
    fn in_bounds(&self) -> bool {
        (0.0..=MAP_WIDTH).contains(&self.x) && (0.0..=MAP_HEIGHT).contains(&self.y)
    }

    fn distance(&self, other: &Transform) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RigidBody {
    vx: f32,
    vy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Health(i16);

#[derive(Debug, Clone, Copy, PartialEq)]
struct Projectile {
    friendly: bool,
    damage: i16,
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

struct MovementSystem {
    core: SystemCore,
}

impl MovementSystem {
    fn new() -> Self {
        let mut core = SystemCore::new();
        core.require_component::<Transform>()
            .require_component::<RigidBody>();
        Self { core }
    }

    fn update(&self, registry: &mut Registry, dt: f32) -> Result<(), EcsError> {
        for entity in self.get_system_entities() {
            let body = *registry.get_component::<RigidBody>(entity)?;
            let transform = registry.get_component_mut::<Transform>(entity)?;
            transform.x += body.vx * dt;
            transform.y += body.vy * dt;
            if transform.in_bounds() {
                continue;
            }
            if registry.entity_has_tag(entity, "player") {
                let transform = registry.get_component_mut::<Transform>(entity)?;
                transform.x = transform.x.clamp(0.0, MAP_WIDTH);
                transform.y = transform.y.clamp(0.0, MAP_HEIGHT);
            } else {
                registry.remove_entity(entity)?;
            }
        }
        Ok(())
    }
}

impl System for MovementSystem {
    fn core(&self) -> &SystemCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }
}

struct DamageSystem {
    core: SystemCore,
}

impl DamageSystem {
    fn new() -> Self {
        let mut core = SystemCore::new();
        core.require_component::<Transform>()
            .require_component::<Projectile>();
        Self { core }
    }

    fn update(&self, registry: &mut Registry) -> Result<(), EcsError> {
        let player = registry.get_entity_by_tag("player").ok();
        let enemies = registry.get_entities_by_group("enemies").unwrap_or_default();

        for projectile in self.get_system_entities() {
            // Already hit something this frame.
            if registry.is_pending_removal(projectile) {
                continue;
            }
            let shot = *registry.get_component::<Projectile>(projectile)?;
            let at = *registry.get_component::<Transform>(projectile)?;

            let targets: Vec<Entity> = if shot.friendly {
                enemies.clone()
            } else {
                player.into_iter().collect()
            };
            let hit = targets.into_iter().find(|&target| {
                !registry.is_pending_removal(target)
                    && registry
                        .get_component::<Transform>(target)
                        .is_ok_and(|t| t.distance(&at) < HIT_RADIUS)
            });
            let Some(target) = hit else {
                continue;
            };

            registry.remove_entity(projectile)?;
            let health = registry.get_component_mut::<Health>(target)?;
            health.0 -= shot.damage;
            if health.0 <= 0 {
                info!(entity = %target, "killed");
                registry.remove_entity(target)?;
            }
        }
        Ok(())
    }
}

impl System for DamageSystem {
    fn core(&self) -> &SystemCore {
        &self.core
    }
    fn core_mut(&mut self) -> &mut SystemCore {
        &mut self.core
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

fn movement_stage(registry: &mut Registry, ctx: &FrameContext) -> Result<(), EcsError> {
    registry.run_system::<MovementSystem, _>(|system, registry| system.update(registry, ctx.dt as f32))?
}

fn damage_stage(registry: &mut Registry, _ctx: &FrameContext) -> Result<(), EcsError> {
    registry.run_system::<DamageSystem, _>(|system, registry| system.update(registry))?
}

/// Spawns a wave of enemies along the top edge every few seconds.
fn wave_stage(registry: &mut Registry, ctx: &FrameContext) -> Result<(), EcsError> {
    if ctx.frame % WAVE_EVERY != 0 {
        return Ok(());
    }
    let wave = ctx.frame / WAVE_EVERY;
    for slot in 0..4u64 {
        let x = 100.0 + ((wave * 7 + slot * 190) % 600) as f32;
        let enemy = registry.create_entity();
        registry
            .entity_mut(enemy)
            .add_component(Transform { x, y: 10.0 })?
            .add_component(RigidBody { vx: 0.0, vy: 25.0 })?
            .add_component(Health(30))?
            .group("enemies")?;
    }
    info!(wave, "wave spawned");
    Ok(())
}

/// Player and enemies fire at each other on a fixed cadence.
fn fire_stage(registry: &mut Registry, ctx: &FrameContext) -> Result<(), EcsError> {
    if ctx.frame % FIRE_EVERY != 0 {
        return Ok(());
    }
    let Ok(player) = registry.get_entity_by_tag("player") else {
        return Ok(());
    };
    let player_at = *registry.get_component::<Transform>(player)?;
    let enemies = registry.get_entities_by_group("enemies").unwrap_or_default();

    let mut shots = Vec::new();
    let nearest = enemies
        .iter()
        .filter_map(|&e| registry.get_component::<Transform>(e).ok().map(|t| (e, *t)))
        .min_by(|a, b| a.1.distance(&player_at).total_cmp(&b.1.distance(&player_at)));
    if let Some((_, target)) = nearest {
        shots.push((player_at, target, true, 10));
    }
    for &enemy in enemies.iter().step_by(2) {
        if let Ok(from) = registry.get_component::<Transform>(enemy) {
            shots.push((*from, player_at, false, 5));
        }
    }

    for (from, to, friendly, damage) in shots {
        let len = from.distance(&to).max(f32::EPSILON);
        let speed = 240.0;
        let projectile = registry.create_entity();
        registry
            .entity_mut(projectile)
            .add_component(from)?
            .add_component(RigidBody {
                vx: (to.x - from.x) / len * speed,
                vy: (to.y - from.y) / len * speed,
            })?
            .add_component(Projectile { friendly, damage })?
            .group("projectiles")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scene setup
// ---------------------------------------------------------------------------

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var("EMBER_CONFIG") {
        Ok(json) => EngineConfig::from_json(&json).context("EMBER_CONFIG is not a valid engine config")?,
        Err(_) => EngineConfig {
            frame: FrameConfig {
                max_frames: Some(600),
                ..Default::default()
            },
            ..Default::default()
        },
    };
    if config.frame.max_frames.is_none() {
        warn!("no frame budget configured; the demo runs until the player dies");
    }

    let mut frames = FrameLoop::from_config(config)?;
    {
        let registry = frames.registry_mut();
        registry.add_system(MovementSystem::new())?;
        registry.add_system(DamageSystem::new())?;

        let player = registry.create_entity();
        registry
            .entity_mut(player)
            .add_component(Transform {
                x: MAP_WIDTH / 2.0,
                y: MAP_HEIGHT - 40.0,
            })?
            .add_component(RigidBody { vx: 30.0, vy: 0.0 })?
            .add_component(Health(100))?
            .tag("player")?;
    }

    frames.add_stage("waves", wave_stage)?;
    frames.add_stage("fire", fire_stage)?;
    frames.add_stage("movement", movement_stage)?;
    frames.add_stage("damage", damage_stage)?;

    let ran = frames.run_until(|registry| registry.get_entity_by_tag("player").is_err())?;

    let registry = frames.registry();
    let player_health = registry
        .get_entity_by_tag("player")
        .and_then(|player| registry.get_component::<Health>(player))
        .map(|health| health.0)
        .ok();
    info!(
        frames = ran,
        elapsed = frames.elapsed(),
        entities = registry.entity_count(),
        enemies = registry.get_entities_by_group("enemies").map(|g| g.len()).unwrap_or(0),
        ?player_health,
        "simulation finished"
    );
    let last = frames.last_diagnostics();
    info!(
        total = ?last.total_time,
        reconcile = ?last.reconcile_time,
        stages = ?last.stage_times,
        "last frame timings"
    );
    Ok(())
}
