#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Ooze Defence engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative building network, and the packet systems. Adapters submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! for systems to react to. Packet delivery is the one place where a system
//! mutates shared state directly, and it does so exclusively through the
//! narrow [`PacketNetwork`] trait.

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests placement of a building at the provided world position.
    PlaceBuilding {
        /// Type of building to construct.
        kind: BuildingKind,
        /// Centre of the building expressed in world units.
        position: WorldPoint,
    },
    /// Requests removal of an existing building from the network.
    DestroyBuilding {
        /// Identifier of the building targeted for removal.
        building: BuildingId,
    },
    /// Switches a building on or off. Disabled buildings never carry power.
    SetBuildingEnabled {
        /// Identifier of the building to toggle.
        building: BuildingId,
        /// Whether the building should be switched on.
        enabled: bool,
    },
    /// Spends stored supplies of a building, e.g. a blaster firing its ammo.
    ConsumeSupply {
        /// Identifier of the building spending supplies.
        building: BuildingId,
        /// Kind of supply being spent.
        packet_type: PacketType,
        /// Number of packets worth of supply to remove.
        amount: u32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the world and the packet systems.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a building was placed into the world.
    BuildingPlaced {
        /// Identifier assigned to the building by the world.
        building: BuildingId,
        /// Type of building that was placed.
        kind: BuildingKind,
        /// Centre of the building.
        position: WorldPoint,
    },
    /// Reports that a building placement request was rejected.
    BuildingPlacementRejected {
        /// Type of building requested for placement.
        kind: BuildingKind,
        /// Position provided in the placement request.
        position: WorldPoint,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Announces that a building received its final construction packet.
    BuildingCompleted {
        /// Identifier of the completed building.
        building: BuildingId,
    },
    /// Confirms that a building was removed from the world.
    BuildingDestroyed {
        /// Identifier of the removed building.
        building: BuildingId,
    },
    /// Signals that reachability, path and power caches were recomputed.
    NetworkRebuilt,
    /// Confirms that a packet reached its destination and was consumed.
    PacketDelivered {
        /// Building that dispatched the packet.
        source: BuildingId,
        /// Building that received the packet.
        target: BuildingId,
        /// Kind of payload carried.
        packet_type: PacketType,
    },
    /// Reports that a packet was cancelled before arriving.
    PacketCancelled {
        /// Building that dispatched the packet.
        source: BuildingId,
        /// Building the packet was heading towards.
        target: BuildingId,
        /// Kind of payload carried.
        packet_type: PacketType,
    },
}

/// Unique identifier assigned to a building.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildingId(u32);

impl BuildingId {
    /// Creates a new building identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Payload categories carried by packets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketType {
    /// Construction material for unbuilt buildings.
    Building,
    /// Ammunition for weapons.
    Ammo,
    /// Charge for energy-storing buildings.
    Energy,
}

impl PacketType {
    /// Every packet type in dispatch priority order.
    pub const ALL: [PacketType; 3] = [Self::Building, Self::Ammo, Self::Energy];

    /// Dense index of the packet type, suitable for per-type counters.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Building => 0,
            Self::Ammo => 1,
            Self::Energy => 2,
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Building => "building",
            Self::Ammo => "ammo",
            Self::Energy => "energy",
        };
        f.write_str(label)
    }
}

/// Types of buildings that can be placed in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    /// Base building that produces power and dispatches packets.
    CommandCenter,
    /// Cheap node that extends the reach of the network.
    Relay,
    /// Weapon that consumes ammo.
    Blaster,
    /// Barrier that stores energy.
    Shield,
}

impl BuildingKind {
    /// Number of BUILDING packets required to finish construction.
    #[must_use]
    pub const fn build_cost(self) -> u32 {
        match self {
            Self::CommandCenter => 0,
            Self::Relay => 3,
            Self::Blaster => 5,
            Self::Shield => 4,
        }
    }

    /// Maximum ammo stored by the building, zero when it takes none.
    #[must_use]
    pub const fn ammo_capacity(self) -> u32 {
        match self {
            Self::Blaster => 10,
            Self::CommandCenter | Self::Relay | Self::Shield => 0,
        }
    }

    /// Maximum energy stored by the building, zero when it takes none.
    #[must_use]
    pub const fn energy_capacity(self) -> u32 {
        match self {
            Self::Shield => 8,
            Self::CommandCenter | Self::Relay | Self::Blaster => 0,
        }
    }

    /// Radius within which the building links to its neighbours.
    ///
    /// Two buildings connect when their distance is within the larger of
    /// their two ranges, so relays extend the reach of short-range kinds.
    #[must_use]
    pub const fn connection_range(self) -> f32 {
        match self {
            Self::CommandCenter => 150.0,
            Self::Relay => 250.0,
            Self::Blaster | Self::Shield => 100.0,
        }
    }

    /// Reports whether the building dispatches packets and powers the network.
    #[must_use]
    pub const fn is_source(self) -> bool {
        matches!(self, Self::CommandCenter)
    }

    /// Capacity of the store refilled by the provided packet type.
    #[must_use]
    pub const fn capacity_for(self, packet_type: PacketType) -> u32 {
        match packet_type {
            PacketType::Building => self.build_cost(),
            PacketType::Ammo => self.ammo_capacity(),
            PacketType::Energy => self.energy_capacity(),
        }
    }
}

/// Continuous position expressed in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    x: f32,
    y: f32,
}

impl WorldPoint {
    /// Creates a new world-space point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Horizontal coordinate.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Vertical coordinate.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: WorldPoint) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Reports whether both coordinates are finite numbers.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Moves `step` units from `self` towards `target` without overshooting.
    ///
    /// Callers are expected to snap onto `target` themselves once the
    /// remaining distance is covered; this helper only handles the partial
    /// move along the unit direction.
    #[must_use]
    pub fn step_towards(self, target: WorldPoint, step: f32) -> WorldPoint {
        let remaining = self.distance(target);
        if remaining <= f32::EPSILON {
            return target;
        }
        let scale = step / remaining;
        WorldPoint::new(
            self.x + (target.x - self.x) * scale,
            self.y + (target.y - self.y) * scale,
        )
    }
}

/// Reasons a building placement request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum PlacementError {
    /// The requested position is not a finite coordinate.
    #[error("placement position is not a finite coordinate")]
    OutOfBounds,
    /// The requested position overlaps an existing building.
    #[error("placement overlaps an existing building")]
    Occupied,
}

/// Immutable representation of a single building's state used by packet systems.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildingStatus {
    /// Identifier allocated to the building by the world.
    pub id: BuildingId,
    /// Kind of building.
    pub kind: BuildingKind,
    /// Centre of the building.
    pub position: WorldPoint,
    /// Indicates whether construction has finished.
    pub is_built: bool,
    /// Indicates whether the building currently carries power.
    pub is_powered: bool,
    /// Construction packets already delivered plus those in flight cover the cost.
    pub is_scheduled_to_build: bool,
    /// Ammo store is at capacity.
    pub is_full_ammo: bool,
    /// Ammo store plus ammo packets in flight reach capacity.
    pub is_scheduled_to_full_ammo: bool,
    /// Total packets of every type currently heading to the building.
    pub packets_in_flight: u32,
    /// Per packet type demand, indexed by [`PacketType::index`].
    pub needs: [bool; 3],
}

impl BuildingStatus {
    /// Reports whether the building wants packets of the provided type.
    #[must_use]
    pub const fn needs_packet(&self, packet_type: PacketType) -> bool {
        self.needs[packet_type.index()]
    }
}

/// Narrow view of the building network consumed by the packet systems.
///
/// The reachability and path caches are owned by the implementor and may be
/// stale: entries can reference buildings that were destroyed since the
/// caches were last rebuilt. Every consumer must re-validate references via
/// [`PacketNetwork::building`] before acting on them.
pub trait PacketNetwork {
    /// Buildings reachable from the provided source, if the source has a cache entry.
    fn reachable_from(&self, source: BuildingId) -> Option<&BTreeSet<BuildingId>>;

    /// Cached shortest route from `source` to `target`, both ends included.
    fn cached_path(&self, source: BuildingId, target: BuildingId) -> Option<&[BuildingId]>;

    /// Reports whether the two buildings are linked in the live graph.
    fn are_connected(&self, a: BuildingId, b: BuildingId) -> bool;

    /// Captures the current state of a building, `None` once it was destroyed.
    fn building(&self, id: BuildingId) -> Option<BuildingStatus>;

    /// Round-robin offset saved by the previous scheduling pass of `source`.
    fn last_target_index(&self, source: BuildingId) -> usize;

    /// Persists the round-robin offset for the next scheduling pass of `source`.
    fn set_last_target_index(&mut self, source: BuildingId, index: usize);

    /// Records that a packet of the provided type is now heading to `building`.
    fn increment_packets_in_flight(&mut self, building: BuildingId, packet_type: PacketType);

    /// Records that a packet heading to `building` arrived or was cancelled.
    fn decrement_packets_in_flight(&mut self, building: BuildingId, packet_type: PacketType);

    /// Applies the payload of an arrived packet to `building`.
    fn received_packet(&mut self, building: BuildingId, packet_type: PacketType);
}

#[cfg(test)]
mod tests {
    use super::{BuildingKind, PacketType, PlacementError, WorldPoint};
    use serde::{de::DeserializeOwned, Serialize};

    fn assert_round_trip<T>(value: &T)
    where
        T: Serialize + DeserializeOwned + PartialEq + std::fmt::Debug,
    {
        let bytes = bincode::serialize(value).expect("serialize");
        let restored: T = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(&restored, value);
    }

    #[test]
    fn building_kind_round_trips_through_bincode() {
        assert_round_trip(&BuildingKind::Relay);
        assert_round_trip(&PlacementError::Occupied);
    }

    #[test]
    fn packet_type_indices_are_dense() {
        for (expected, packet_type) in PacketType::ALL.iter().enumerate() {
            assert_eq!(packet_type.index(), expected);
        }
    }

    #[test]
    fn step_towards_moves_along_unit_direction() {
        let origin = WorldPoint::new(0.0, 0.0);
        let target = WorldPoint::new(3.0, 4.0);

        let moved = origin.step_towards(target, 2.5);

        assert!((moved.x() - 1.5).abs() < 1e-5);
        assert!((moved.y() - 2.0).abs() < 1e-5);
        assert!((origin.distance(target) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn only_command_centers_dispatch_packets() {
        assert!(BuildingKind::CommandCenter.is_source());
        assert!(!BuildingKind::Relay.is_source());
        assert_eq!(BuildingKind::CommandCenter.build_cost(), 0);
        assert_eq!(
            BuildingKind::Blaster.capacity_for(PacketType::Ammo),
            BuildingKind::Blaster.ammo_capacity()
        );
    }
}
