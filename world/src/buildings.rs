//! Authoritative building state management utilities.

use std::collections::BTreeMap;

use log::warn;
use ooze_defence_core::{BuildingId, BuildingKind, BuildingStatus, PacketType, WorldPoint};

/// State of a single building stored inside the world.
#[derive(Clone, Debug)]
pub(crate) struct Building {
    /// Identifier allocated by the world for the building.
    pub(crate) id: BuildingId,
    /// Kind of building that was placed.
    pub(crate) kind: BuildingKind,
    /// Centre of the building.
    pub(crate) position: WorldPoint,
    /// Construction packets received so far.
    pub(crate) progress: u32,
    pub(crate) built: bool,
    pub(crate) enabled: bool,
    pub(crate) powered: bool,
    pub(crate) ammo: u32,
    pub(crate) energy: u32,
    in_flight: [u32; 3],
}

impl Building {
    pub(crate) fn new(id: BuildingId, kind: BuildingKind, position: WorldPoint) -> Self {
        Self {
            id,
            kind,
            position,
            progress: 0,
            built: kind.build_cost() == 0,
            enabled: true,
            powered: false,
            ammo: 0,
            energy: 0,
            in_flight: [0; 3],
        }
    }

    pub(crate) fn in_flight(&self, packet_type: PacketType) -> u32 {
        self.in_flight[packet_type.index()]
    }

    pub(crate) fn needs_packet(&self, packet_type: PacketType) -> bool {
        match packet_type {
            PacketType::Building => !self.built,
            PacketType::Ammo => self.built && self.ammo < self.kind.ammo_capacity(),
            PacketType::Energy => self.built && self.energy < self.kind.energy_capacity(),
        }
    }

    pub(crate) fn is_scheduled_to_build(&self) -> bool {
        !self.built
            && self.progress.saturating_add(self.in_flight(PacketType::Building))
                >= self.kind.build_cost()
    }

    pub(crate) fn is_full_ammo(&self) -> bool {
        self.ammo >= self.kind.ammo_capacity()
    }

    pub(crate) fn is_scheduled_to_full_ammo(&self) -> bool {
        self.ammo.saturating_add(self.in_flight(PacketType::Ammo)) >= self.kind.ammo_capacity()
    }

    pub(crate) fn increment_in_flight(&mut self, packet_type: PacketType) {
        let slot = &mut self.in_flight[packet_type.index()];
        *slot = slot.saturating_add(1);
    }

    pub(crate) fn decrement_in_flight(&mut self, packet_type: PacketType) {
        let slot = &mut self.in_flight[packet_type.index()];
        if *slot == 0 {
            warn!(
                "in-flight {packet_type} counter of building {} would drop below zero",
                self.id
            );
            return;
        }
        *slot -= 1;
    }

    /// Applies a delivered payload. Returns `true` when construction completed.
    pub(crate) fn receive(&mut self, packet_type: PacketType) -> bool {
        match packet_type {
            PacketType::Building => {
                if self.built {
                    return false;
                }
                self.progress = self.progress.saturating_add(1);
                if self.progress >= self.kind.build_cost() {
                    self.built = true;
                    return true;
                }
                false
            }
            PacketType::Ammo => {
                self.ammo = (self.ammo + 1).min(self.kind.ammo_capacity());
                false
            }
            PacketType::Energy => {
                self.energy = (self.energy + 1).min(self.kind.energy_capacity());
                false
            }
        }
    }

    pub(crate) fn consume(&mut self, packet_type: PacketType, amount: u32) {
        match packet_type {
            PacketType::Ammo => self.ammo = self.ammo.saturating_sub(amount),
            PacketType::Energy => self.energy = self.energy.saturating_sub(amount),
            PacketType::Building => {}
        }
    }

    pub(crate) fn status(&self) -> BuildingStatus {
        let mut needs = [false; 3];
        for packet_type in PacketType::ALL {
            needs[packet_type.index()] = self.needs_packet(packet_type);
        }

        BuildingStatus {
            id: self.id,
            kind: self.kind,
            position: self.position,
            is_built: self.built,
            is_powered: self.powered,
            is_scheduled_to_build: self.is_scheduled_to_build(),
            is_full_ammo: self.is_full_ammo(),
            is_scheduled_to_full_ammo: self.is_scheduled_to_full_ammo(),
            packets_in_flight: self.in_flight.iter().sum(),
            needs,
        }
    }
}

/// Registry that stores buildings and manages identifier allocation.
///
/// Identifiers are never reused, so an identifier that no longer resolves
/// permanently denotes a destroyed building.
#[derive(Debug)]
pub(crate) struct BuildingRegistry {
    entries: BTreeMap<BuildingId, Building>,
    next_building_id: BuildingId,
}

impl BuildingRegistry {
    /// Creates an empty building registry with a reset identifier counter.
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_building_id: BuildingId::new(0),
        }
    }

    pub(crate) fn insert(&mut self, kind: BuildingKind, position: WorldPoint) -> BuildingId {
        let id = self.next_building_id;
        self.next_building_id = BuildingId::new(id.get().saturating_add(1));
        let _ = self.entries.insert(id, Building::new(id, kind, position));
        id
    }

    pub(crate) fn remove(&mut self, id: BuildingId) -> Option<Building> {
        self.entries.remove(&id)
    }

    pub(crate) fn get(&self, id: BuildingId) -> Option<&Building> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Building> {
        self.entries.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Building> {
        self.entries.values_mut()
    }

    pub(crate) fn is_built(&self, id: BuildingId) -> bool {
        self.entries.get(&id).is_some_and(|building| building.built)
    }

    /// Reports whether any building sits closer than `spacing` to `position`.
    pub(crate) fn is_occupied(&self, position: WorldPoint, spacing: f32) -> bool {
        self.entries
            .values()
            .any(|building| building.position.distance(position) < spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_allocates_monotonic_identifiers() {
        let mut registry = BuildingRegistry::new();
        let first = registry.insert(BuildingKind::Relay, WorldPoint::new(0.0, 0.0));
        let _ = registry.remove(first);
        let second = registry.insert(BuildingKind::Relay, WorldPoint::new(0.0, 0.0));

        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
        assert!(registry.get(first).is_none());
    }

    #[test]
    fn construction_completes_after_build_cost_packets() {
        let mut relay = Building::new(BuildingId::new(3), BuildingKind::Relay, WorldPoint::default());
        assert!(relay.needs_packet(PacketType::Building));

        for _ in 1..BuildingKind::Relay.build_cost() {
            assert!(!relay.receive(PacketType::Building));
        }
        assert!(relay.receive(PacketType::Building));
        assert!(relay.built);
        assert!(!relay.needs_packet(PacketType::Building));
        assert!(!relay.receive(PacketType::Building));
    }

    #[test]
    fn in_flight_packets_schedule_construction() {
        let mut blaster =
            Building::new(BuildingId::new(1), BuildingKind::Blaster, WorldPoint::default());
        for _ in 0..BuildingKind::Blaster.build_cost() {
            assert!(!blaster.is_scheduled_to_build());
            blaster.increment_in_flight(PacketType::Building);
        }
        assert!(blaster.is_scheduled_to_build());
        assert_eq!(blaster.status().packets_in_flight, BuildingKind::Blaster.build_cost());
    }

    #[test]
    fn decrement_never_underflows() {
        let mut relay = Building::new(BuildingId::new(1), BuildingKind::Relay, WorldPoint::default());
        relay.decrement_in_flight(PacketType::Ammo);
        assert_eq!(relay.in_flight(PacketType::Ammo), 0);
    }

    #[test]
    fn ammo_refills_up_to_capacity() {
        let mut blaster =
            Building::new(BuildingId::new(1), BuildingKind::Blaster, WorldPoint::default());
        blaster.built = true;
        assert!(blaster.needs_packet(PacketType::Ammo));

        for _ in 0..BuildingKind::Blaster.ammo_capacity() + 2 {
            let _ = blaster.receive(PacketType::Ammo);
        }

        assert!(blaster.is_full_ammo());
        assert!(!blaster.needs_packet(PacketType::Ammo));
        blaster.consume(PacketType::Ammo, 3);
        assert_eq!(blaster.ammo, BuildingKind::Blaster.ammo_capacity() - 3);
    }
}
