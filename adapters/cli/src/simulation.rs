use std::{fmt, time::Duration};

use log::{info, warn};
use ooze_defence_core::{BuildingKind, Command, Event, PacketType};
use ooze_defence_system_packets::PacketManager;
use ooze_defence_system_supply::{Supply, SupplyRequest};
use ooze_defence_world::{self as world, query, World};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::scenario::Scenario;

/// Counters reported once the run finishes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Summary {
    /// Ticks that were simulated.
    pub(crate) ticks: u32,
    /// Packets that reached their target.
    pub(crate) delivered: usize,
    /// Packets cancelled on the way.
    pub(crate) cancelled: usize,
    /// Buildings that received their final construction packet.
    pub(crate) completed: usize,
    /// Placements the world refused.
    pub(crate) rejected: usize,
    /// Buildings removed by chaos.
    pub(crate) destroyed: usize,
    /// Ammo spent by blasters.
    pub(crate) ammo_spent: u32,
    /// Buildings that remain in the world.
    pub(crate) buildings: usize,
    /// Remaining buildings that are fully constructed.
    pub(crate) built: usize,
    /// Largest number of carriers the pool ever owned.
    pub(crate) pool_high_water_mark: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ticks simulated:      {}", self.ticks)?;
        writeln!(f, "packets delivered:    {}", self.delivered)?;
        writeln!(f, "packets cancelled:    {}", self.cancelled)?;
        writeln!(f, "buildings completed:  {}", self.completed)?;
        writeln!(f, "placements rejected:  {}", self.rejected)?;
        writeln!(f, "buildings destroyed:  {}", self.destroyed)?;
        writeln!(f, "ammo spent:           {}", self.ammo_spent)?;
        writeln!(f, "buildings built:      {}/{}", self.built, self.buildings)?;
        write!(f, "pool high-water mark: {}", self.pool_high_water_mark)
    }
}

/// Drives the world together with the supply and packet systems.
#[derive(Debug)]
pub(crate) struct Simulation {
    world: World,
    supply: Supply,
    packets: PacketManager,
    rng: ChaCha8Rng,
    chaos: f64,
    summary: Summary,
}

impl Simulation {
    /// Seeds a world from the scenario. `chaos` must lie within `0.0..=1.0`.
    pub(crate) fn new(scenario: &Scenario, seed: u64, chaos: f64) -> Self {
        let mut simulation = Self {
            world: World::new(),
            supply: Supply::new(scenario.supply()),
            packets: PacketManager::new(scenario.packets()),
            rng: ChaCha8Rng::seed_from_u64(seed),
            chaos,
            summary: Summary::default(),
        };

        let mut events = Vec::new();
        for command in scenario.placements() {
            world::apply(&mut simulation.world, command, &mut events);
        }
        simulation.record(&events);
        simulation
    }

    /// Advances every system by one tick of `dt`.
    pub(crate) fn step(&mut self, dt: Duration) {
        let mut events = Vec::new();
        world::apply(&mut self.world, Command::Tick { dt }, &mut events);

        let mut requests = Vec::new();
        let sources = query::packet_sources(&self.world);
        self.supply.handle(&events, &sources, &mut requests);
        for SupplyRequest {
            source,
            quota,
            packet_type,
        } in requests
        {
            let _ = self
                .packets
                .propagate(&mut self.world, source, quota, packet_type);
        }

        self.packets.tick(dt, &mut self.world, &mut events);
        self.fire_blasters(&mut events);
        self.unleash_chaos(&mut events);

        self.summary.ticks = self.summary.ticks.saturating_add(1);
        self.record(&events);
    }

    /// Final counters for the run so far.
    pub(crate) fn summary(&self) -> Summary {
        let view = query::building_view(&self.world);
        Summary {
            buildings: view.len(),
            built: view.iter().filter(|status| status.is_built).count(),
            pool_high_water_mark: self.packets.pool().high_water_mark(),
            ..self.summary
        }
    }

    fn fire_blasters(&mut self, events: &mut Vec<Event>) {
        for building in query::buildings_of_kind(&self.world, BuildingKind::Blaster) {
            let Some((ammo, _)) = query::supplies(&self.world, building) else {
                continue;
            };
            if ammo == 0 {
                continue;
            }
            world::apply(
                &mut self.world,
                Command::ConsumeSupply {
                    building,
                    packet_type: PacketType::Ammo,
                    amount: 1,
                },
                events,
            );
            self.summary.ammo_spent = self.summary.ammo_spent.saturating_add(1);
        }
    }

    fn unleash_chaos(&mut self, events: &mut Vec<Event>) {
        if self.chaos <= 0.0 || !self.rng.gen_bool(self.chaos) {
            return;
        }

        let candidates: Vec<_> = query::building_view(&self.world)
            .into_iter()
            .filter(|status| !status.kind.is_source())
            .map(|status| status.id)
            .collect();
        let Some(&building) = candidates.choose(&mut self.rng) else {
            return;
        };

        info!("chaos destroys building {building}");
        world::apply(
            &mut self.world,
            Command::DestroyBuilding { building },
            events,
        );
    }

    fn record(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::PacketDelivered { .. } => self.summary.delivered += 1,
                Event::PacketCancelled { .. } => self.summary.cancelled += 1,
                Event::BuildingCompleted { .. } => self.summary.completed += 1,
                Event::BuildingDestroyed { .. } => self.summary.destroyed += 1,
                Event::BuildingPlacementRejected {
                    kind,
                    position,
                    reason,
                } => {
                    warn!(
                        "could not place {kind:?} at ({}, {}): {reason}",
                        position.x(),
                        position.y()
                    );
                    self.summary.rejected += 1;
                }
                Event::TimeAdvanced { .. }
                | Event::BuildingPlaced { .. }
                | Event::NetworkRebuilt => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(seed: u64, chaos: f64, ticks: u32) -> Summary {
        let scenario = Scenario::built_in().expect("built-in scenario parses");
        let mut simulation = Simulation::new(&scenario, seed, chaos);
        for _ in 0..ticks {
            simulation.step(Duration::from_millis(100));
        }
        simulation.summary()
    }

    #[test]
    fn built_in_scenario_finishes_construction() {
        let summary = run(0, 0.0, 1_200);

        assert_eq!(summary.ticks, 1_200);
        assert_eq!(summary.rejected, 0);
        assert_eq!(summary.destroyed, 0);
        assert_eq!(summary.buildings, 8);
        assert_eq!(summary.built, summary.buildings);
        assert_eq!(summary.completed, 7);
        assert!(summary.delivered > summary.completed);
        assert!(summary.ammo_spent > 0);
        assert!(summary.pool_high_water_mark >= 16);
    }

    #[test]
    fn same_seed_reproduces_the_run() {
        assert_eq!(run(7, 0.05, 300), run(7, 0.05, 300));
    }

    #[test]
    fn chaos_never_removes_the_command_center() {
        let summary = run(3, 1.0, 40);

        assert_eq!(summary.destroyed, 7);
        assert_eq!(summary.buildings, 1);
        assert_eq!(summary.built, 1);
    }

    #[test]
    fn overlapping_placements_are_counted() {
        let scenario = Scenario::from_toml_str(
            r#"
            [[buildings]]
            kind = "command_center"
            x = 0.0
            y = 0.0

            [[buildings]]
            kind = "relay"
            x = 5.0
            y = 5.0
            "#,
        )
        .expect("scenario parses");

        let simulation = Simulation::new(&scenario, 0, 0.0);
        let summary = simulation.summary();
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.buildings, 1);
    }
}
