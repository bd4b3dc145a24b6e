//! Single in-flight delivery unit that walks a multi-hop path.

use std::time::Duration;

use ooze_defence_core::{BuildingId, PacketNetwork, PacketType, WorldPoint};

/// Lifecycle stage of a packet carrier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierState {
    /// Parked inside the pool.
    Idle,
    /// Travelling along its path.
    Moving,
    /// Reached the final waypoint. Inert until released.
    Arrived,
    /// Lost its next waypoint before arriving. Inert until released.
    CleanedUp,
}

/// Completion notification produced by [`Packet::advance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CarrierOutcome {
    /// The carrier reached the terminal waypoint.
    Arrived {
        /// Final building of the path.
        target: BuildingId,
        /// Payload carried.
        packet_type: PacketType,
    },
    /// The next waypoint vanished before the carrier could reach it.
    CleanedUp {
        /// Final building of the path, which may itself be gone.
        target: BuildingId,
    },
}

/// Packet carrier that advances along precomputed waypoints at constant speed.
///
/// Exactly one [`CarrierOutcome`] is produced per launch; afterwards the
/// carrier stays inert until the pool resets it.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Payload carried.
    pub packet_type: PacketType,
    /// Travel speed in world units per second.
    pub speed: f32,
    /// Private copy of the validated route, source first.
    pub path: Vec<BuildingId>,
    current_index: usize,
    position: WorldPoint,
    state: CarrierState,
}

impl Packet {
    pub(crate) fn idle() -> Self {
        Self {
            packet_type: PacketType::Building,
            speed: 0.0,
            path: Vec::new(),
            current_index: 0,
            position: WorldPoint::default(),
            state: CarrierState::Idle,
        }
    }

    pub(crate) fn launch(
        &mut self,
        packet_type: PacketType,
        speed: f32,
        path: Vec<BuildingId>,
        start: WorldPoint,
    ) {
        self.packet_type = packet_type;
        self.speed = speed;
        self.path = path;
        self.current_index = 0;
        self.position = start;
        self.state = CarrierState::Moving;
    }

    pub(crate) fn reset(&mut self) {
        self.path.clear();
        self.current_index = 0;
        self.state = CarrierState::Idle;
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn state(&self) -> CarrierState {
        self.state
    }

    /// Current world-space position.
    #[must_use]
    pub const fn position(&self) -> WorldPoint {
        self.position
    }

    /// Index of the last waypoint the carrier reached.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Final building of the path, if any.
    #[must_use]
    pub fn target(&self) -> Option<BuildingId> {
        self.path.last().copied()
    }

    /// Moves the carrier by one simulation step.
    ///
    /// Returns an outcome exactly once per launch. Paths shorter than two
    /// waypoints, or paths truncated at or behind the current waypoint,
    /// never move and never complete.
    pub fn advance<N>(&mut self, dt: Duration, network: &N) -> Option<CarrierOutcome>
    where
        N: PacketNetwork + ?Sized,
    {
        if self.state != CarrierState::Moving || self.path.len() < 2 {
            return None;
        }

        let last_index = self.path.len() - 1;
        let target = *self.path.last()?;
        // path may have been shortened behind the cursor
        let next_id = *self.path.get(self.current_index + 1)?;

        let Some(next) = network.building(next_id) else {
            self.state = CarrierState::CleanedUp;
            return Some(CarrierOutcome::CleanedUp { target });
        };

        let step = self.speed * dt.as_secs_f32();
        let remaining = self.position.distance(next.position);

        if remaining > step {
            self.position = self.position.step_towards(next.position, step);
            return None;
        }

        // snap to avoid overshoot jitter
        self.position = next.position;
        self.current_index += 1;

        if self.current_index == last_index {
            self.state = CarrierState::Arrived;
            return Some(CarrierOutcome::Arrived {
                target,
                packet_type: self.packet_type,
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use ooze_defence_core::{BuildingKind, BuildingStatus};

    use super::*;

    #[derive(Default)]
    struct Waypoints {
        positions: BTreeMap<BuildingId, WorldPoint>,
    }

    impl Waypoints {
        fn with(mut self, id: u32, x: f32, y: f32) -> Self {
            let _ = self.positions.insert(BuildingId::new(id), WorldPoint::new(x, y));
            self
        }
    }

    impl PacketNetwork for Waypoints {
        fn reachable_from(&self, _source: BuildingId) -> Option<&BTreeSet<BuildingId>> {
            None
        }

        fn cached_path(&self, _source: BuildingId, _target: BuildingId) -> Option<&[BuildingId]> {
            None
        }

        fn are_connected(&self, _a: BuildingId, _b: BuildingId) -> bool {
            true
        }

        fn building(&self, id: BuildingId) -> Option<BuildingStatus> {
            self.positions.get(&id).map(|position| BuildingStatus {
                id,
                kind: BuildingKind::Relay,
                position: *position,
                is_built: true,
                is_powered: true,
                is_scheduled_to_build: false,
                is_full_ammo: true,
                is_scheduled_to_full_ammo: true,
                packets_in_flight: 0,
                needs: [false; 3],
            })
        }

        fn last_target_index(&self, _source: BuildingId) -> usize {
            0
        }

        fn set_last_target_index(&mut self, _source: BuildingId, _index: usize) {}

        fn increment_packets_in_flight(&mut self, _building: BuildingId, _packet_type: PacketType) {}

        fn decrement_packets_in_flight(&mut self, _building: BuildingId, _packet_type: PacketType) {}

        fn received_packet(&mut self, _building: BuildingId, _packet_type: PacketType) {}
    }

    fn launched(path: &[u32], speed: f32) -> Packet {
        let mut packet = Packet::idle();
        packet.launch(
            PacketType::Ammo,
            speed,
            path.iter().copied().map(BuildingId::new).collect(),
            WorldPoint::new(0.0, 0.0),
        );
        packet
    }

    #[test]
    fn moves_at_constant_speed_towards_next_waypoint() {
        let network = Waypoints::default().with(0, 0.0, 0.0).with(1, 100.0, 0.0);
        let mut packet = launched(&[0, 1], 10.0);

        assert_eq!(packet.advance(Duration::from_secs(2), &network), None);
        assert!((packet.position().x() - 20.0).abs() < 1e-4);
        assert_eq!(packet.current_index(), 0);
    }

    #[test]
    fn snaps_onto_waypoints_and_arrives_once() {
        let network = Waypoints::default()
            .with(0, 0.0, 0.0)
            .with(1, 10.0, 0.0)
            .with(2, 10.0, 10.0);
        let mut packet = launched(&[0, 1, 2], 15.0);

        assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
        assert_eq!(packet.position(), WorldPoint::new(10.0, 0.0));
        assert_eq!(packet.current_index(), 1);

        assert_eq!(
            packet.advance(Duration::from_secs(1), &network),
            Some(CarrierOutcome::Arrived {
                target: BuildingId::new(2),
                packet_type: PacketType::Ammo,
            })
        );
        assert_eq!(packet.state(), CarrierState::Arrived);
        assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
    }

    #[test]
    fn missing_next_waypoint_cleans_up_once() {
        let network = Waypoints::default().with(0, 0.0, 0.0).with(2, 50.0, 0.0);
        let mut packet = launched(&[0, 1, 2], 5.0);

        assert_eq!(
            packet.advance(Duration::from_secs(1), &network),
            Some(CarrierOutcome::CleanedUp {
                target: BuildingId::new(2)
            })
        );
        assert_eq!(packet.state(), CarrierState::CleanedUp);
        assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
    }

    #[test]
    fn degenerate_path_never_fires() {
        let network = Waypoints::default().with(0, 0.0, 0.0);
        let mut packet = launched(&[0], 5.0);

        for _ in 0..4 {
            assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
        }
        assert_eq!(packet.state(), CarrierState::Moving);
    }

    #[test]
    fn truncated_path_behind_cursor_stops_without_panicking() {
        let network = Waypoints::default()
            .with(0, 0.0, 0.0)
            .with(1, 10.0, 0.0)
            .with(2, 20.0, 0.0);
        let mut packet = launched(&[0, 1, 2], 10.0);

        assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
        assert_eq!(packet.current_index(), 1);

        packet.path.truncate(2);
        for _ in 0..3 {
            assert_eq!(packet.advance(Duration::from_secs(1), &network), None);
        }
        assert_eq!(packet.position(), WorldPoint::new(10.0, 0.0));
        assert_eq!(packet.state(), CarrierState::Moving);
    }
}
