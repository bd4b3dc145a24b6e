#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative building network state for Ooze Defence.

mod buildings;
mod network;

use std::collections::BTreeSet;

use log::debug;
use ooze_defence_core::{
    BuildingId, BuildingKind, BuildingStatus, Command, Event, PacketNetwork, PacketType,
    PlacementError, WorldPoint,
};

use buildings::BuildingRegistry;
use network::Network;

/// Minimum distance kept between the centres of two buildings.
pub const MIN_SPACING: f32 = 20.0;

/// Represents the authoritative Ooze Defence building network.
#[derive(Debug)]
pub struct World {
    buildings: BuildingRegistry,
    network: Network,
    completed: Vec<BuildingId>,
    tick_index: u64,
}

impl World {
    /// Creates an empty world without any buildings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buildings: BuildingRegistry::new(),
            network: Network::default(),
            completed: Vec::new(),
            tick_index: 0,
        }
    }

    fn place_building(
        &mut self,
        kind: BuildingKind,
        position: WorldPoint,
    ) -> Result<BuildingId, PlacementError> {
        if !position.is_finite() {
            return Err(PlacementError::OutOfBounds);
        }
        if self.buildings.is_occupied(position, MIN_SPACING) {
            return Err(PlacementError::Occupied);
        }

        let neighbors: Vec<BuildingId> = self
            .buildings
            .iter()
            .filter(|other| {
                let range = kind.connection_range().max(other.kind.connection_range());
                other.position.distance(position) <= range
            })
            .map(|other| other.id)
            .collect();

        let id = self.buildings.insert(kind, position);
        self.network.insert_node(id, &neighbors);
        Ok(id)
    }

    fn sources(&self) -> Vec<BuildingId> {
        self.buildings
            .iter()
            .filter(|building| building.kind.is_source() && building.built)
            .map(|building| building.id)
            .collect()
    }

    /// Recomputes caches and power after structural changes.
    fn refresh(&mut self) {
        let sources = self.sources();
        let buildings = &self.buildings;
        self.network
            .rebuild_with(&sources, |id| buildings.is_built(id));

        let mut powered: BTreeSet<BuildingId> = BTreeSet::new();
        for &source in &sources {
            if !self.buildings.get(source).is_some_and(|b| b.enabled) {
                continue;
            }
            let _ = powered.insert(source);
            if let Some(reachable) = self.network.reachable_from(source) {
                powered.extend(reachable.iter().copied());
            }
        }

        for building in self.buildings.iter_mut() {
            building.powered =
                building.built && building.enabled && powered.contains(&building.id);
        }

        debug!(
            "network rebuilt for {} source(s), {} powered building(s)",
            sources.len(),
            powered.len()
        );
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::PlaceBuilding { kind, position } => match world.place_building(kind, position) {
            Ok(building) => out_events.push(Event::BuildingPlaced {
                building,
                kind,
                position,
            }),
            Err(reason) => out_events.push(Event::BuildingPlacementRejected {
                kind,
                position,
                reason,
            }),
        },
        Command::DestroyBuilding { building } => {
            if world.buildings.remove(building).is_some() {
                world.network.remove_node(building);
                world.completed.retain(|id| *id != building);
                out_events.push(Event::BuildingDestroyed { building });
            }
        }
        Command::SetBuildingEnabled { building, enabled } => {
            if let Some(state) = world.buildings.get_mut(building) {
                if state.enabled != enabled {
                    state.enabled = enabled;
                    world.network.mark_dirty();
                }
            }
        }
        Command::ConsumeSupply {
            building,
            packet_type,
            amount,
        } => {
            if let Some(state) = world.buildings.get_mut(building) {
                state.consume(packet_type, amount);
            }
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            out_events.push(Event::TimeAdvanced { dt });

            for building in world.completed.drain(..) {
                out_events.push(Event::BuildingCompleted { building });
            }

            if world.network.is_dirty() {
                world.refresh();
                out_events.push(Event::NetworkRebuilt);
            }
        }
    }
}

impl PacketNetwork for World {
    fn reachable_from(&self, source: BuildingId) -> Option<&BTreeSet<BuildingId>> {
        self.network.reachable_from(source)
    }

    fn cached_path(&self, source: BuildingId, target: BuildingId) -> Option<&[BuildingId]> {
        self.network.cached_path(source, target)
    }

    fn are_connected(&self, a: BuildingId, b: BuildingId) -> bool {
        let buildings = &self.buildings;
        self.network.are_connected(a, b, |id| buildings.is_built(id))
    }

    fn building(&self, id: BuildingId) -> Option<BuildingStatus> {
        self.buildings.get(id).map(|building| building.status())
    }

    fn last_target_index(&self, source: BuildingId) -> usize {
        self.network.last_target_index(source)
    }

    fn set_last_target_index(&mut self, source: BuildingId, index: usize) {
        self.network.set_last_target_index(source, index);
    }

    fn increment_packets_in_flight(&mut self, building: BuildingId, packet_type: PacketType) {
        if let Some(state) = self.buildings.get_mut(building) {
            state.increment_in_flight(packet_type);
        }
    }

    fn decrement_packets_in_flight(&mut self, building: BuildingId, packet_type: PacketType) {
        if let Some(state) = self.buildings.get_mut(building) {
            state.decrement_in_flight(packet_type);
        }
    }

    fn received_packet(&mut self, building: BuildingId, packet_type: PacketType) {
        let Some(state) = self.buildings.get_mut(building) else {
            return;
        };
        if state.receive(packet_type) {
            debug!("building {building} finished construction");
            self.completed.push(building);
            self.network.mark_dirty();
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use ooze_defence_core::{BuildingId, BuildingKind, BuildingStatus};

    /// Number of ticks processed since the world was created.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Captures the state of every building ordered by identifier.
    #[must_use]
    pub fn building_view(world: &World) -> Vec<BuildingStatus> {
        world.buildings.iter().map(|building| building.status()).collect()
    }

    /// Captures the state of a single building.
    #[must_use]
    pub fn building(world: &World, id: BuildingId) -> Option<BuildingStatus> {
        world.buildings.get(id).map(|building| building.status())
    }

    /// Enumerates built buildings that dispatch packets.
    #[must_use]
    pub fn packet_sources(world: &World) -> Vec<BuildingId> {
        world.sources()
    }

    /// Enumerates buildings of the provided kind.
    #[must_use]
    pub fn buildings_of_kind(world: &World, kind: BuildingKind) -> Vec<BuildingId> {
        world
            .buildings
            .iter()
            .filter(|building| building.kind == kind)
            .map(|building| building.id)
            .collect()
    }

    /// Buildings directly linked to `id` in the live graph.
    #[must_use]
    pub fn neighbors(world: &World, id: BuildingId) -> Vec<BuildingId> {
        world.network.neighbors(id).collect()
    }

    /// Reports whether caches are awaiting a rebuild on the next tick.
    #[must_use]
    pub fn caches_stale(world: &World) -> bool {
        world.network.is_dirty()
    }

    /// Stored ammo and energy of a building.
    #[must_use]
    pub fn supplies(world: &World, id: BuildingId) -> Option<(u32, u32)> {
        world
            .buildings
            .get(id)
            .map(|building| (building.ammo, building.energy))
    }

    /// Construction packets a building has received so far.
    #[must_use]
    pub fn build_progress(world: &World, id: BuildingId) -> Option<u32> {
        world.buildings.get(id).map(|building| building.progress)
    }
}
