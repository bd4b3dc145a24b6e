//! Path traversability rules applied immediately before dispatch.

use ooze_defence_core::{BuildingId, PacketNetwork, PacketType};
use thiserror::Error;

/// Reasons a cached path cannot carry a packet right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathRejection {
    /// Fewer than two waypoints.
    #[error("path has {len} waypoint(s), at least two are required")]
    TooShort {
        /// Number of waypoints on the path.
        len: usize,
    },
    /// The endpoints are no longer linked in the live graph.
    #[error("{origin} and {destination} are not connected")]
    Disconnected {
        /// First waypoint.
        origin: BuildingId,
        /// Last waypoint.
        destination: BuildingId,
    },
    /// A waypoint was destroyed.
    #[error("waypoint {0} no longer exists")]
    MissingBuilding(BuildingId),
    /// Neither end of a hop carries power.
    #[error("hop {from} -> {to} has no powered end")]
    Unpowered {
        /// Start of the hop.
        from: BuildingId,
        /// End of the hop.
        to: BuildingId,
    },
    /// A waypoint that must relay the packet is still under construction.
    #[error("waypoint {0} is not built")]
    Unbuilt(BuildingId),
}

/// Checks every hop of `path` against the live network.
///
/// Each hop needs both ends to exist, at least one end powered, and both
/// ends built. The final hop of a BUILDING packet only requires its origin
/// to be built, since the destination is the construction site itself.
pub fn check_path<N>(
    network: &N,
    path: &[BuildingId],
    packet_type: PacketType,
) -> Result<(), PathRejection>
where
    N: PacketNetwork + ?Sized,
{
    let (Some(&origin), Some(&destination)) = (path.first(), path.last()) else {
        return Err(PathRejection::TooShort { len: path.len() });
    };
    if path.len() < 2 {
        return Err(PathRejection::TooShort { len: path.len() });
    }
    if !network.are_connected(origin, destination) {
        return Err(PathRejection::Disconnected {
            origin,
            destination,
        });
    }

    let last_hop = path.len() - 2;
    for (hop, pair) in path.windows(2).enumerate() {
        let (from_id, to_id) = (pair[0], pair[1]);
        let from = network
            .building(from_id)
            .ok_or(PathRejection::MissingBuilding(from_id))?;
        let to = network
            .building(to_id)
            .ok_or(PathRejection::MissingBuilding(to_id))?;

        if !from.is_powered && !to.is_powered {
            return Err(PathRejection::Unpowered {
                from: from_id,
                to: to_id,
            });
        }
        if !from.is_built {
            return Err(PathRejection::Unbuilt(from_id));
        }
        let construction_site = hop == last_hop && packet_type == PacketType::Building;
        if !to.is_built && !construction_site {
            return Err(PathRejection::Unbuilt(to_id));
        }
    }

    Ok(())
}

/// Convenience wrapper around [`check_path`].
#[must_use]
pub fn is_path_traversable<N>(network: &N, path: &[BuildingId], packet_type: PacketType) -> bool
where
    N: PacketNetwork + ?Sized,
{
    check_path(network, path, packet_type).is_ok()
}
