//! Shared event builders for unit tests.

use firecheck_protocol::{
    EntityType, EventIdentifier, VelocityVector, WeaponFireEvent, WorldLocation,
};

pub fn event(issuer: &str, count: u16) -> WeaponFireEvent {
    WeaponFireEvent {
        identifier: EventIdentifier::new(issuer, count),
        firing_object_id: "tank-1".into(),
        target_object_id: "bmp-2".into(),
        munition_object_id: format!("round-{}", count),
        munition_type: EntityType::new(2, 9, 225, 2, 14, 1, 0),
        warhead_type: 1000,
        fuse_type: 1100,
        quantity_fired: 1,
        rate_of_fire: 0,
        fire_mission_index: 3,
        fire_control_solution_range: 2400.0,
        firing_location: WorldLocation::new(0.0, 0.0, 0.0),
        initial_velocity_vector: VelocityVector::new(10.0, 0.0, 0.0),
    }
}

pub fn sut(count: u16) -> WeaponFireEvent {
    event("SUT", count)
}
