#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Packet routing and delivery between buildings of the network.
//!
//! [`PacketManager::propagate`] picks demanding buildings reachable from a
//! source in round-robin order, re-validates each cached route against the
//! live network, and launches pooled carriers along private copies of those
//! routes. [`PacketManager::tick`] moves the carriers and reconciles the
//! in-flight counters once each carrier arrives or is cancelled.

mod carrier;
mod pool;
mod traversal;

use std::{collections::BTreeMap, time::Duration};

use log::{debug, warn};
use ooze_defence_core::{BuildingId, BuildingStatus, Event, PacketNetwork, PacketType, WorldPoint};
use thiserror::Error;

pub use carrier::{CarrierOutcome, CarrierState, Packet};
pub use pool::{CarrierId, PacketPool, PoolError};
pub use traversal::{check_path, is_path_traversable, PathRejection};

const DEFAULT_SPEED: f32 = 120.0;
const DEFAULT_STAGGER: Duration = Duration::from_millis(100);
const DEFAULT_POOL_SIZE: usize = 16;

/// Configuration parameters required to construct the packet manager.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PacketConfig {
    speed: f32,
    stagger: Duration,
    initial_pool_size: usize,
}

/// Rejected packet configuration values.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// Carriers would never reach their target.
    #[error("packet speed must be positive and finite, got {0}")]
    InvalidSpeed(f32),
}

impl PacketConfig {
    /// Creates a new configuration from carrier speed, spawn stagger and pool size.
    ///
    /// `speed` must be positive and finite, otherwise carriers never arrive
    /// and their targets keep counting them as in flight. Use
    /// [`PacketConfig::try_new`] for values that are not known to be valid.
    #[must_use]
    pub const fn new(speed: f32, stagger: Duration, initial_pool_size: usize) -> Self {
        Self {
            speed,
            stagger,
            initial_pool_size,
        }
    }

    /// Creates a configuration after checking that carriers can make progress.
    pub fn try_new(
        speed: f32,
        stagger: Duration,
        initial_pool_size: usize,
    ) -> Result<Self, ConfigError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ConfigError::InvalidSpeed(speed));
        }
        Ok(Self::new(speed, stagger, initial_pool_size))
    }

    /// Carrier speed in world units per second.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    /// Delay added between consecutive launches of one scheduling pass.
    #[must_use]
    pub const fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Number of carriers allocated up front.
    #[must_use]
    pub const fn initial_pool_size(&self) -> usize {
        self.initial_pool_size
    }
}

impl Default for PacketConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SPEED, DEFAULT_STAGGER, DEFAULT_POOL_SIZE)
    }
}

/// Read-only description of a carrier in flight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CarrierSnapshot {
    /// Pool handle of the carrier.
    pub id: CarrierId,
    /// Building that dispatched the packet.
    pub source: BuildingId,
    /// Building the packet is heading towards.
    pub target: BuildingId,
    /// Payload carried.
    pub packet_type: PacketType,
    /// Current world-space position.
    pub position: WorldPoint,
}

#[derive(Clone, Copy, Debug)]
struct Delivery {
    source: BuildingId,
    target: BuildingId,
    packet_type: PacketType,
}

#[derive(Debug)]
struct PendingSpawn {
    delay: Duration,
    delivery: Delivery,
    path: Vec<BuildingId>,
    start: WorldPoint,
}

#[derive(Debug, Error)]
enum SkipReason {
    #[error("candidate no longer exists")]
    Missing,
    #[error("candidate no longer wants {0} packets")]
    Satisfied(PacketType),
    #[error("no cached path")]
    NoCachedPath,
    #[error(transparent)]
    Path(#[from] PathRejection),
}

/// Schedules, launches and settles packet deliveries.
#[derive(Debug)]
pub struct PacketManager {
    config: PacketConfig,
    pool: PacketPool,
    deliveries: BTreeMap<CarrierId, Delivery>,
    pending: Vec<PendingSpawn>,
}

impl PacketManager {
    /// Creates a packet manager using the supplied configuration.
    #[must_use]
    pub fn new(config: PacketConfig) -> Self {
        Self {
            config,
            pool: PacketPool::with_capacity(config.initial_pool_size),
            deliveries: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// Dispatches up to `quota` packets of `packet_type` from `source`.
    ///
    /// Returns the number of packets committed. Each committed packet has
    /// already been counted as in flight towards its target, even when its
    /// launch is still waiting out the spawn stagger.
    pub fn propagate<N>(
        &mut self,
        network: &mut N,
        source: BuildingId,
        quota: usize,
        packet_type: PacketType,
    ) -> usize
    where
        N: PacketNetwork + ?Sized,
    {
        if quota == 0 {
            return 0;
        }
        let Some(reachable) = network.reachable_from(source) else {
            return 0;
        };

        if !has_over_queue_rule(packet_type) {
            debug!("no over-queue rule for {packet_type} packets, sending unfiltered");
        }

        let targets: Vec<BuildingId> = reachable
            .iter()
            .copied()
            .filter(|&candidate| candidate != source)
            .filter(|&candidate| {
                network
                    .building(candidate)
                    .is_some_and(|status| wants_packet(&status, packet_type))
            })
            .collect();

        if targets.is_empty() {
            return 0;
        }

        let count = targets.len();
        let mut index = network.last_target_index(source) % count;
        let mut sent = 0;
        let mut delay = Duration::ZERO;

        for _ in 0..count {
            if sent == quota {
                break;
            }
            let candidate = targets[index];
            index = (index + 1) % count;

            match self.dispatch(network, source, candidate, packet_type, delay) {
                Ok(()) => {
                    sent += 1;
                    delay += self.config.stagger;
                }
                Err(reason) => {
                    debug!("skipping {packet_type} delivery {source} -> {candidate}: {reason}");
                }
            }
        }

        network.set_last_target_index(source, index);
        sent
    }

    fn dispatch<N>(
        &mut self,
        network: &mut N,
        source: BuildingId,
        candidate: BuildingId,
        packet_type: PacketType,
        delay: Duration,
    ) -> Result<(), SkipReason>
    where
        N: PacketNetwork + ?Sized,
    {
        let status = network.building(candidate).ok_or(SkipReason::Missing)?;
        if !wants_packet(&status, packet_type) {
            return Err(SkipReason::Satisfied(packet_type));
        }

        let path = {
            let cached = network
                .cached_path(source, candidate)
                .ok_or(SkipReason::NoCachedPath)?;
            if cached.len() < 2 {
                return Err(PathRejection::TooShort { len: cached.len() }.into());
            }
            if let Some(&gone) = cached.iter().find(|&&id| network.building(id).is_none()) {
                return Err(PathRejection::MissingBuilding(gone).into());
            }
            if !network.are_connected(source, candidate) {
                return Err(PathRejection::Disconnected {
                    origin: source,
                    destination: candidate,
                }
                .into());
            }
            check_path(&*network, cached, packet_type)?;
            cached.to_vec()
        };

        let start = network
            .building(path[0])
            .map(|origin| origin.position)
            .ok_or(SkipReason::Missing)?;

        // must be visible to later passes before the carrier exists
        network.increment_packets_in_flight(candidate, packet_type);

        let delivery = Delivery {
            source,
            target: candidate,
            packet_type,
        };
        let spawn = PendingSpawn {
            delay,
            delivery,
            path,
            start,
        };
        if delay.is_zero() {
            let _ = self.launch(spawn);
        } else {
            self.pending.push(spawn);
        }
        Ok(())
    }

    fn launch(&mut self, spawn: PendingSpawn) -> CarrierId {
        let id = self.pool.acquire(
            spawn.delivery.packet_type,
            self.config.speed,
            spawn.path,
            spawn.start,
        );
        let _ = self.deliveries.insert(id, spawn.delivery);
        id
    }

    /// Advances every carrier by `dt`, settles completions and launches due spawns.
    pub fn tick<N>(&mut self, dt: Duration, network: &mut N, out: &mut Vec<Event>)
    where
        N: PacketNetwork + ?Sized,
    {
        let mut completions = Vec::new();
        for (id, packet) in self.pool.iter_mut() {
            if let Some(outcome) = packet.advance(dt, &*network) {
                completions.push((id, outcome));
            }
        }

        for (id, outcome) in completions {
            self.complete(id, outcome, network, out);
        }

        let (due, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|spawn| spawn.delay <= dt);
        self.pending = waiting
            .into_iter()
            .map(|mut spawn| {
                spawn.delay -= dt;
                spawn
            })
            .collect();
        for spawn in due {
            // a spawn due mid-tick travels for the rest of the tick
            let remainder = dt - spawn.delay;
            let id = self.launch(spawn);
            let outcome = self
                .pool
                .get_mut(id)
                .and_then(|packet| packet.advance(remainder, &*network));
            if let Some(outcome) = outcome {
                self.complete(id, outcome, network, out);
            }
        }
    }

    fn complete<N>(
        &mut self,
        id: CarrierId,
        outcome: CarrierOutcome,
        network: &mut N,
        out: &mut Vec<Event>,
    ) where
        N: PacketNetwork + ?Sized,
    {
        let Some(delivery) = self.deliveries.remove(&id) else {
            warn!("carrier {id:?} completed twice, ignoring");
            return;
        };
        let Delivery {
            source,
            target,
            packet_type,
        } = delivery;

        match outcome {
            CarrierOutcome::Arrived { .. } => {
                network.received_packet(target, packet_type);
                network.decrement_packets_in_flight(target, packet_type);
                out.push(Event::PacketDelivered {
                    source,
                    target,
                    packet_type,
                });
            }
            CarrierOutcome::CleanedUp { .. } => {
                if network.building(target).is_some() {
                    network.decrement_packets_in_flight(target, packet_type);
                }
                out.push(Event::PacketCancelled {
                    source,
                    target,
                    packet_type,
                });
            }
        }

        if let Err(error) = self.pool.release(id) {
            warn!("failed to return carrier to pool: {error}");
        }
    }

    /// Describes every carrier currently in flight, ordered by handle.
    #[must_use]
    pub fn active_carriers(&self) -> Vec<CarrierSnapshot> {
        self.deliveries
            .iter()
            .filter_map(|(&id, delivery)| {
                self.pool.get(id).map(|packet| CarrierSnapshot {
                    id,
                    source: delivery.source,
                    target: delivery.target,
                    packet_type: delivery.packet_type,
                    position: packet.position(),
                })
            })
            .collect()
    }

    /// Borrows a carrier currently in flight.
    #[must_use]
    pub fn carrier(&self, id: CarrierId) -> Option<&Packet> {
        self.pool.get(id)
    }

    /// Mutably borrows a carrier currently in flight.
    pub fn carrier_mut(&mut self, id: CarrierId) -> Option<&mut Packet> {
        self.pool.get_mut(id)
    }

    /// Number of committed packets still waiting for their staggered launch.
    #[must_use]
    pub fn pending_spawns(&self) -> usize {
        self.pending.len()
    }

    /// Number of committed packets that have not yet arrived or been cancelled.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.deliveries.len() + self.pending.len()
    }

    /// Provides read-only access to the carrier pool.
    #[must_use]
    pub const fn pool(&self) -> &PacketPool {
        &self.pool
    }

    /// Configuration the manager was created with.
    #[must_use]
    pub const fn config(&self) -> PacketConfig {
        self.config
    }
}

impl Default for PacketManager {
    fn default() -> Self {
        Self::new(PacketConfig::default())
    }
}

fn has_over_queue_rule(packet_type: PacketType) -> bool {
    matches!(packet_type, PacketType::Building | PacketType::Ammo)
}

/// Building already has enough packets delivered or on the way.
fn is_over_queued(status: &BuildingStatus, packet_type: PacketType) -> bool {
    match packet_type {
        PacketType::Building => status.is_scheduled_to_build || status.is_built,
        PacketType::Ammo => status.is_scheduled_to_full_ammo || status.is_full_ammo,
        PacketType::Energy => false,
    }
}

fn wants_packet(status: &BuildingStatus, packet_type: PacketType) -> bool {
    status.needs_packet(packet_type) && !is_over_queued(status, packet_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ooze_defence_core::BuildingKind;

    fn status(packet_type_needs: [bool; 3]) -> BuildingStatus {
        BuildingStatus {
            id: BuildingId::new(1),
            kind: BuildingKind::Blaster,
            position: WorldPoint::default(),
            is_built: false,
            is_powered: false,
            is_scheduled_to_build: false,
            is_full_ammo: false,
            is_scheduled_to_full_ammo: false,
            packets_in_flight: 0,
            needs: packet_type_needs,
        }
    }

    #[test]
    fn config_rejects_stalled_carriers() {
        for speed in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                PacketConfig::try_new(speed, Duration::ZERO, 4),
                Err(ConfigError::InvalidSpeed(_))
            ));
        }
        assert_eq!(
            PacketConfig::try_new(30.0, Duration::from_millis(50), 4),
            Ok(PacketConfig::new(30.0, Duration::from_millis(50), 4))
        );
    }

    #[test]
    fn scheduled_construction_is_over_queued() {
        let mut building = status([true, false, false]);
        assert!(wants_packet(&building, PacketType::Building));

        building.is_scheduled_to_build = true;
        assert!(!wants_packet(&building, PacketType::Building));
    }

    #[test]
    fn scheduled_ammo_is_over_queued() {
        let mut building = status([false, true, false]);
        building.is_built = true;
        assert!(wants_packet(&building, PacketType::Ammo));

        building.is_scheduled_to_full_ammo = true;
        assert!(!wants_packet(&building, PacketType::Ammo));
    }

    #[test]
    fn energy_passes_over_queue_filter() {
        let mut building = status([false, false, true]);
        building.is_built = true;
        building.is_full_ammo = true;
        building.is_scheduled_to_full_ammo = true;
        building.is_scheduled_to_build = true;

        assert!(!has_over_queue_rule(PacketType::Energy));
        assert!(wants_packet(&building, PacketType::Energy));
    }

    #[test]
    fn default_config_staggers_by_a_tenth_of_a_second() {
        let config = PacketConfig::default();
        assert_eq!(config.stagger(), Duration::from_millis(100));
        assert!(config.speed() > 0.0);
    }
}
