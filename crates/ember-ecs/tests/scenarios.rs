//! End-to-end registry scenarios: membership, deferral, recycling, tags.

use ember_ecs::prelude::*;

// -- Component types --------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct A(i32);

#[derive(Debug, Clone, PartialEq)]
struct B(i32);

#[derive(Debug, Clone, PartialEq)]
struct C(i32);

// -- Systems ----------------------------------------------------------------

macro_rules! system {
    ($name:ident requires $($kind:ty),*) => {
        struct $name {
            core: SystemCore,
        }

        impl $name {
            fn new() -> Self {
                let mut core = SystemCore::new();
                $( core.require_component::<$kind>(); )*
                Self { core }
            }
        }

        impl System for $name {
            fn core(&self) -> &SystemCore {
                &self.core
            }
            fn core_mut(&mut self) -> &mut SystemCore {
                &mut self.core
            }
        }
    };
}

system!(SysAB requires A, B);
system!(SysABC requires A, B, C);
system!(SysA requires A);

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn members<S: System>(registry: &Registry) -> Vec<Entity> {
    registry.get_system::<S>().unwrap().get_system_entities()
}

fn entity_with_ab(registry: &mut Registry) -> Entity {
    let e = registry.create_entity();
    registry.add_component(e, A(1)).unwrap();
    registry.add_component(e, B(2)).unwrap();
    e
}

// -- Scenarios --------------------------------------------------------------

#[test]
fn system_requiring_ab_sees_entity_with_ab() {
    init_logging();
    let mut registry = Registry::new();
    let e = entity_with_ab(&mut registry);
    registry.add_system(SysAB::new()).unwrap();
    registry.update();
    assert_eq!(members::<SysAB>(&registry), vec![e]);
}

#[test]
fn system_requiring_abc_ignores_entity_with_ab() {
    init_logging();
    let mut registry = Registry::new();
    let _e = entity_with_ab(&mut registry);
    registry.add_system(SysABC::new()).unwrap();
    registry.update();
    assert_eq!(members::<SysABC>(&registry), vec![]);
}

#[test]
fn removed_entity_leaves_system_after_update() {
    init_logging();
    let mut registry = Registry::new();
    let e = entity_with_ab(&mut registry);
    registry.add_system(SysAB::new()).unwrap();
    registry.update();

    registry.entity_mut(e).remove().unwrap();
    assert_eq!(members::<SysAB>(&registry), vec![e]);

    registry.update();
    assert!(!members::<SysAB>(&registry).contains(&e));
    assert_eq!(registry.get_signature(e), Signature::EMPTY);
}

#[test]
fn adding_same_kind_twice_overwrites() {
    init_logging();
    let mut registry = Registry::new();
    let e = registry.create_entity();
    registry.add_component(e, A(1)).unwrap();
    registry.add_component(e, A(2)).unwrap();
    assert_eq!(registry.pool::<A>().unwrap().len(), 1);
    assert_eq!(registry.entity(e).get_component::<A>().unwrap(), &A(2));
}

// -- Deferred visibility ----------------------------------------------------

#[test]
fn entity_created_mid_frame_appears_after_next_update() {
    let mut registry = Registry::new();
    registry.add_system(SysA::new()).unwrap();
    let first = registry.create_entity();
    registry.add_component(first, A(0)).unwrap();
    registry.update();

    // A system spawns while iterating its own snapshot.
    registry
        .run_system::<SysA, _>(|system, registry| {
            for _ in system.get_system_entities() {
                let spawned = registry.create_entity();
                registry.add_component(spawned, A(1)).unwrap();
            }
        })
        .unwrap();
    assert_eq!(members::<SysA>(&registry), vec![first]);
    assert_eq!(registry.entity_count(), 2);

    registry.update();
    assert_eq!(members::<SysA>(&registry).len(), 2);
}

#[test]
fn snapshot_taken_before_update_keeps_removed_entity() {
    let mut registry = Registry::new();
    registry.add_system(SysA::new()).unwrap();
    let entities: Vec<Entity> = (0..4)
        .map(|i| {
            let e = registry.create_entity();
            registry.add_component(e, A(i)).unwrap();
            e
        })
        .collect();
    registry.update();

    let snapshot = members::<SysA>(&registry);
    for &e in &snapshot {
        if registry.get_component::<A>(e).unwrap().0 % 2 == 0 {
            registry.remove_entity(e).unwrap();
        }
    }
    assert_eq!(snapshot, entities);
    assert_eq!(members::<SysA>(&registry), entities);

    registry.update();
    assert_eq!(members::<SysA>(&registry), vec![entities[1], entities[3]]);
}

// -- Id recycling -----------------------------------------------------------

#[test]
fn recycled_id_starts_clean() {
    let mut registry = Registry::new();
    registry.add_system(SysA::new()).unwrap();
    let old = entity_with_ab(&mut registry);
    registry.add_tag_to_entity(old, "player").unwrap();
    registry.add_group_to_entity(old, "heroes").unwrap();
    registry.update();

    registry.remove_entity(old).unwrap();
    let not_yet = registry.create_entity();
    assert_ne!(not_yet, old);
    registry.update();

    let reused = registry.create_entity();
    assert_eq!(reused, old);
    assert!(registry.get_signature(reused).is_empty());
    assert!(!registry.has_component::<A>(reused));
    assert!(!registry.has_component::<B>(reused));
    assert!(registry.get_entity_by_tag("player").is_err());
    assert!(!registry.entity_in_group(reused, "heroes"));

    registry.update();
    assert!(!members::<SysA>(&registry).contains(&reused));
}

// -- Tags and groups --------------------------------------------------------

#[test]
fn tag_lookup_round_trip() {
    let mut registry = Registry::new();
    let e = registry.create_entity();
    registry.add_tag_to_entity(e, "player").unwrap();
    assert_eq!(registry.get_entity_by_tag("player"), Ok(e));
    assert!(registry.entity_has_tag(e, "player"));

    registry.remove_tag_from_entity(e);
    assert!(registry.get_entity_by_tag("player").is_err());
    assert!(!registry.entity_has_tag(e, "player"));
}

#[test]
fn retagging_replaces_the_old_tag() {
    let mut registry = Registry::new();
    let e = registry.create_entity();
    let other = registry.create_entity();
    registry.add_tag_to_entity(e, "player").unwrap();
    registry.add_tag_to_entity(e, "ghost").unwrap();
    assert_eq!(
        registry.get_entity_by_tag("player"),
        Err(EcsError::UnknownTag {
            tag: "player".to_owned()
        })
    );

    // Taking a tag from another entity strips it there.
    registry.add_tag_to_entity(other, "ghost").unwrap();
    assert_eq!(registry.get_entity_by_tag("ghost"), Ok(other));
    assert_eq!(registry.get_tag(e), None);
}

#[test]
fn group_membership_survives_until_removal() {
    let mut registry = Registry::new();
    let grunts: Vec<Entity> = (0..3).map(|_| registry.create_entity()).collect();
    for &e in &grunts {
        registry.entity_mut(e).group("enemies").unwrap();
    }
    registry.update();
    assert_eq!(registry.get_entities_by_group("enemies").unwrap(), grunts);

    registry.remove_entity(grunts[1]).unwrap();
    assert_eq!(registry.get_entities_by_group("enemies").unwrap(), grunts);
    registry.update();
    assert_eq!(
        registry.get_entities_by_group("enemies").unwrap(),
        vec![grunts[0], grunts[2]]
    );
}

// -- Configuration errors ---------------------------------------------------

struct Kind<const N: usize>;

system!(WantsTooMuch requires Kind<100>);

#[test]
fn thirty_third_kind_is_rejected() {
    let mut registry = Registry::new();
    let e = registry.create_entity();

    macro_rules! add_kinds {
        ($($n:literal)*) => { $( registry.add_component(e, Kind::<$n>).unwrap(); )* };
    }
    add_kinds!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15
               16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31);
    assert_eq!(registry.get_signature(e).len(), MAX_COMPONENTS);

    assert!(matches!(
        registry.add_component(e, A(0)),
        Err(EcsError::ComponentLimitExceeded { .. })
    ));
    assert!(matches!(
        registry.add_system(WantsTooMuch::new()),
        Err(EcsError::ComponentLimitExceeded { .. })
    ));
    assert!(!registry.has_system::<WantsTooMuch>());
}
