//! Shared vocabulary for the firecheck conformance harness.
//!
//! This crate defines the canonical `WeaponFire` interaction record, the
//! RPR-FOM parameter names it travels under on the federation bus, and the
//! listener/bus traits the conformance core is driven through.  It has no
//! knowledge of verdicts or tolerances; that lives in `firecheck-core`.
//!
//! # Data flow
//!
//! ```text
//! SUT federate ──publish──▶ InteractionBus ──receive_interaction──▶ listener
//!                            (Interaction:                           (decodes with
//!                             class + named,                          WeaponFireDecoder
//!                             encoded params)                         into WeaponFireEvent)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod codec;

// ═══════════════════════════════════════════════════════════════════════
//  Interaction class and parameter names
// ═══════════════════════════════════════════════════════════════════════

/// Interaction class name of a weapon fire event.
pub const WEAPON_FIRE: &str = "WeaponFire";

pub const EVENT_IDENTIFIER: &str = "EventIdentifier";
pub const FIRE_CONTROL_SOLUTION_RANGE: &str = "FireControlSolutionRange";
pub const FIRE_MISSION_INDEX: &str = "FireMissionIndex";
pub const FIRING_LOCATION: &str = "FiringLocation";
pub const FIRING_OBJECT_IDENTIFIER: &str = "FiringObjectIdentifier";
pub const FUSE_TYPE: &str = "FuseType";
pub const INITIAL_VELOCITY_VECTOR: &str = "InitialVelocityVector";
pub const MUNITION_OBJECT_IDENTIFIER: &str = "MunitionObjectIdentifier";
pub const MUNITION_TYPE: &str = "MunitionType";
pub const QUANTITY_FIRED: &str = "QuantityFired";
pub const RATE_OF_FIRE: &str = "RateOfFire";
pub const TARGET_OBJECT_IDENTIFIER: &str = "TargetObjectIdentifier";
pub const WARHEAD_TYPE: &str = "WarheadType";

/// Every parameter a `WeaponFire` interaction carries, in FOM order.
pub const WEAPON_FIRE_PARAMETERS: [&str; 13] = [
    EVENT_IDENTIFIER,
    FIRE_CONTROL_SOLUTION_RANGE,
    FIRE_MISSION_INDEX,
    FIRING_LOCATION,
    FIRING_OBJECT_IDENTIFIER,
    FUSE_TYPE,
    INITIAL_VELOCITY_VECTOR,
    MUNITION_OBJECT_IDENTIFIER,
    MUNITION_TYPE,
    QUANTITY_FIRED,
    RATE_OF_FIRE,
    TARGET_OBJECT_IDENTIFIER,
    WARHEAD_TYPE,
];

// ═══════════════════════════════════════════════════════════════════════
//  Canonical event record
// ═══════════════════════════════════════════════════════════════════════

/// Composite key of a weapon fire event (RPR `EventIdentifierStruct`).
///
/// Unique per federation run; the only join key between the reference
/// dataset and the events discovered on the bus.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventIdentifier {
    /// Object (simulation) that issued the event.
    pub issuing_object: String,
    /// Event number assigned by the issuer.
    pub event_count: u16,
}

impl EventIdentifier {
    pub fn new(issuing_object: impl Into<String>, event_count: u16) -> Self {
        Self {
            issuing_object: issuing_object.into(),
            event_count,
        }
    }
}

impl fmt::Display for EventIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.issuing_object, self.event_count)
    }
}

/// DIS entity type enumeration, used for the munition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityType {
    pub kind: u8,
    pub domain: u8,
    pub country: u16,
    pub category: u8,
    pub subcategory: u8,
    pub specific: u8,
    pub extra: u8,
}

impl EntityType {
    pub const fn new(
        kind: u8,
        domain: u8,
        country: u16,
        category: u8,
        subcategory: u8,
        specific: u8,
        extra: u8,
    ) -> Self {
        Self {
            kind,
            domain,
            country,
            category,
            subcategory,
            specific,
            extra,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}.{}",
            self.kind,
            self.domain,
            self.country,
            self.category,
            self.subcategory,
            self.specific,
            self.extra
        )
    }
}

/// Geocentric world coordinate in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldLocation {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldLocation {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for WorldLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Velocity in metres per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl VelocityVector {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Components at wire precision.
    pub fn components(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl fmt::Display for VelocityVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Canonical weapon fire event, as decoded from the bus or loaded from
/// the reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponFireEvent {
    pub identifier: EventIdentifier,
    pub firing_object_id: String,
    pub target_object_id: String,
    pub munition_object_id: String,
    pub munition_type: EntityType,
    pub warhead_type: u16,
    pub fuse_type: u16,
    pub quantity_fired: u16,
    pub rate_of_fire: u16,
    pub fire_mission_index: u32,
    pub fire_control_solution_range: f32,
    pub firing_location: WorldLocation,
    pub initial_velocity_vector: VelocityVector,
}

impl fmt::Display for WeaponFireEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WeaponFire[{}] {} -> {} munition={} type={} qty={} at {}",
            self.identifier,
            self.firing_object_id,
            self.target_object_id,
            self.munition_object_id,
            self.munition_type,
            self.quantity_fired,
            self.firing_location,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Bus interface
// ═══════════════════════════════════════════════════════════════════════

/// Named, still-encoded parameters of one interaction.
pub type ParameterMap = BTreeMap<String, Vec<u8>>;

/// One interaction as delivered by the federation bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    /// Interaction class name (e.g. [`WEAPON_FIRE`]).
    pub class: String,
    pub parameters: ParameterMap,
}

impl Interaction {
    pub fn new(class: impl Into<String>, parameters: ParameterMap) -> Self {
        Self {
            class: class.into(),
            parameters,
        }
    }

    pub fn is_weapon_fire(&self) -> bool {
        self.class == WEAPON_FIRE
    }
}

/// Receives interactions pushed by a bus.
///
/// A bus may call `receive_interaction` from several threads at once.
pub trait InteractionListener: Send + Sync {
    fn receive_interaction(&self, interaction: &Interaction);
}

/// Handle returned by [`InteractionBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Publish/subscribe surface of a federation bus.
pub trait InteractionBus: Send + Sync {
    /// Deliver every subsequent interaction of `class` to `listener`.
    fn subscribe(&self, class: &str, listener: Arc<dyn InteractionListener>) -> SubscriptionId;

    /// Stop deliveries for a subscription.  Returns `false` if it was
    /// not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Hand an interaction to the bus for delivery.
    fn publish(&self, interaction: Interaction);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_names_are_unique() {
        let mut names: Vec<&str> = WEAPON_FIRE_PARAMETERS.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), WEAPON_FIRE_PARAMETERS.len());
    }

    #[test]
    fn identifiers_order_by_issuer_then_count() {
        let a = EventIdentifier::new("SUT-1", 9);
        let b = EventIdentifier::new("SUT-1", 10);
        let c = EventIdentifier::new("SUT-2", 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "SUT-1:9");
    }

    #[test]
    fn entity_type_displays_dotted() {
        let t = EntityType::new(2, 9, 225, 2, 14, 1, 0);
        assert_eq!(t.to_string(), "2.9.225.2.14.1.0");
    }

    #[test]
    fn velocity_components_keep_wire_precision() {
        let v = VelocityVector::new(10.5, -3.25, 0.1);
        assert_eq!(v.components(), [10.5, -3.25, 0.1f32]);
    }

    #[test]
    fn event_serializes_with_camel_case_keys() {
        let event = WeaponFireEvent {
            identifier: EventIdentifier::new("SUT", 1),
            firing_object_id: "tank-1".into(),
            target_object_id: "tank-2".into(),
            munition_object_id: "shell-1".into(),
            munition_type: EntityType::new(2, 9, 225, 2, 14, 1, 0),
            warhead_type: 1000,
            fuse_type: 1000,
            quantity_fired: 1,
            rate_of_fire: 0,
            fire_mission_index: 0,
            fire_control_solution_range: 2500.0,
            firing_location: WorldLocation::new(1.0, 2.0, 3.0),
            initial_velocity_vector: VelocityVector::new(10.0, 0.0, 0.0),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["identifier"]["issuingObject"], "SUT");
        assert_eq!(json["munitionType"]["country"], 225);
        assert_eq!(json["fireControlSolutionRange"], 2500.0);
        assert_eq!(json["initialVelocityVector"]["x"], 10.0);

        let back: WeaponFireEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn interaction_class_check() {
        assert!(Interaction::new(WEAPON_FIRE, ParameterMap::new()).is_weapon_fire());
        assert!(!Interaction::new("MunitionDetonation", ParameterMap::new()).is_weapon_fire());
    }
}
