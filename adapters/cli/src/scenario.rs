use std::time::Duration;

use ooze_defence_core::{BuildingKind, Command, PacketType, WorldPoint};
use ooze_defence_system_packets::{ConfigError, PacketConfig};
use ooze_defence_system_supply::Config as SupplyConfig;
use serde::Deserialize;
use thiserror::Error;

/// Layout used when no scenario file is supplied on the command line.
pub(crate) const BUILT_IN_SCENARIO: &str = r#"
[[buildings]]
kind = "command_center"
x = 0.0
y = 0.0

[[buildings]]
kind = "relay"
x = 200.0
y = 0.0

[[buildings]]
kind = "relay"
x = 400.0
y = 40.0

[[buildings]]
kind = "blaster"
x = 80.0
y = 90.0

[[buildings]]
kind = "blaster"
x = 260.0
y = 90.0

[[buildings]]
kind = "blaster"
x = 480.0
y = 120.0

[[buildings]]
kind = "shield"
x = -60.0
y = 100.0

[[buildings]]
kind = "shield"
x = 420.0
y = -80.0
"#;

/// Errors raised while reading a scenario description.
#[derive(Debug, Error)]
pub(crate) enum ScenarioError {
    /// The document was not valid scenario TOML.
    #[error("could not parse scenario: {0}")]
    Parse(#[from] toml::de::Error),
    /// The scenario did not contain a single building.
    #[error("scenario does not place any buildings")]
    NoBuildings,
    /// Without a command center nothing can dispatch packets.
    #[error("scenario needs at least one command_center")]
    NoCommandCenter,
    /// A building used a coordinate that is not a finite number.
    #[error("building {index} has a non-finite position ({x}, {y})")]
    InvalidPosition {
        /// Zero-based position of the entry in the `buildings` list.
        index: usize,
        /// Horizontal coordinate from the document.
        x: f32,
        /// Vertical coordinate from the document.
        y: f32,
    },
    /// The `[packets]` table held unusable values.
    #[error("invalid [packets] table: {0}")]
    Packets(#[from] ConfigError),
}

/// Building entry of a scenario file.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BuildingEntry {
    kind: BuildingKind,
    x: f32,
    y: f32,
}

/// Optional `[supply]` table overriding the dispatch cadence.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SupplySection {
    interval_ms: u64,
    building_quota: usize,
    ammo_quota: usize,
    energy_quota: usize,
}

impl Default for SupplySection {
    fn default() -> Self {
        let config = SupplyConfig::default();
        Self {
            interval_ms: duration_millis(config.interval()),
            building_quota: config.quota(PacketType::Building),
            ammo_quota: config.quota(PacketType::Ammo),
            energy_quota: config.quota(PacketType::Energy),
        }
    }
}

/// Optional `[packets]` table overriding carrier behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PacketSection {
    speed: f32,
    stagger_ms: u64,
    initial_pool_size: usize,
}

impl Default for PacketSection {
    fn default() -> Self {
        let config = PacketConfig::default();
        Self {
            speed: config.speed(),
            stagger_ms: duration_millis(config.stagger()),
            initial_pool_size: config.initial_pool_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioDocument {
    #[serde(default)]
    buildings: Vec<BuildingEntry>,
    #[serde(default)]
    supply: SupplySection,
    #[serde(default)]
    packets: PacketSection,
}

/// Validated scenario ready to seed a simulation.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Scenario {
    buildings: Vec<BuildingEntry>,
    supply: SupplyConfig,
    packets: PacketConfig,
}

impl Scenario {
    /// Parses and validates a scenario from TOML text.
    pub(crate) fn from_toml_str(source: &str) -> Result<Self, ScenarioError> {
        let document: ScenarioDocument = toml::from_str(source)?;

        if document.buildings.is_empty() {
            return Err(ScenarioError::NoBuildings);
        }
        if !document
            .buildings
            .iter()
            .any(|entry| entry.kind.is_source())
        {
            return Err(ScenarioError::NoCommandCenter);
        }
        for (index, entry) in document.buildings.iter().enumerate() {
            if !entry.x.is_finite() || !entry.y.is_finite() {
                return Err(ScenarioError::InvalidPosition {
                    index,
                    x: entry.x,
                    y: entry.y,
                });
            }
        }

        let packets = document.packets;
        let packets = PacketConfig::try_new(
            packets.speed,
            Duration::from_millis(packets.stagger_ms),
            packets.initial_pool_size,
        )?;

        let supply = document.supply;
        Ok(Self {
            buildings: document.buildings,
            supply: SupplyConfig::new(
                Duration::from_millis(supply.interval_ms),
                supply.building_quota,
                supply.ammo_quota,
                supply.energy_quota,
            ),
            packets,
        })
    }

    /// Scenario shipped with the binary.
    pub(crate) fn built_in() -> Result<Self, ScenarioError> {
        Self::from_toml_str(BUILT_IN_SCENARIO)
    }

    /// Placement commands for every building, in file order.
    pub(crate) fn placements(&self) -> impl Iterator<Item = Command> + '_ {
        self.buildings.iter().map(|entry| Command::PlaceBuilding {
            kind: entry.kind,
            position: WorldPoint::new(entry.x, entry.y),
        })
    }

    /// Number of buildings the scenario places.
    pub(crate) fn building_count(&self) -> usize {
        self.buildings.len()
    }

    /// Supply cadence configured by the scenario.
    pub(crate) fn supply(&self) -> SupplyConfig {
        self.supply
    }

    /// Packet configuration configured by the scenario.
    pub(crate) fn packets(&self) -> PacketConfig {
        self.packets
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
