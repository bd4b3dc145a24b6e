//! Reusable packet carriers with generational loan handles.

use log::debug;
use ooze_defence_core::{BuildingId, PacketType, WorldPoint};
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::carrier::Packet;

new_key_type! {
    /// Handle to a carrier currently on loan from a [`PacketPool`].
    pub struct CarrierId;
}

/// Errors reported by [`PacketPool::release`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// The handle was already released or never issued by this pool.
    #[error("carrier {0:?} is not on loan")]
    NotOnLoan(CarrierId),
}

/// Pool of packet carriers.
///
/// Idle carriers are owned by the pool directly; loaned carriers live in a
/// slot map whose keys are handed out. Releasing moves a carrier back to the
/// idle set and retires its key, so stale handles can never alias a later
/// loan of the same carrier.
#[derive(Debug, Default)]
pub struct PacketPool {
    idle: Vec<Packet>,
    on_loan: SlotMap<CarrierId, Packet>,
    high_water_mark: usize,
}

impl PacketPool {
    /// Creates a pool pre-populated with `capacity` idle carriers.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            idle: (0..capacity).map(|_| Packet::idle()).collect(),
            on_loan: SlotMap::with_capacity_and_key(capacity),
            high_water_mark: capacity,
        }
    }

    /// Loans out a carrier initialised for a new delivery, growing on demand.
    pub fn acquire(
        &mut self,
        packet_type: PacketType,
        speed: f32,
        path: Vec<BuildingId>,
        start: WorldPoint,
    ) -> CarrierId {
        let mut packet = match self.idle.pop() {
            Some(packet) => packet,
            None => {
                self.high_water_mark += 1;
                debug!(
                    "packet pool exhausted, growing to {} carriers",
                    self.high_water_mark
                );
                Packet::idle()
            }
        };
        packet.launch(packet_type, speed, path, start);
        self.on_loan.insert(packet)
    }

    /// Returns a loaned carrier to the idle set.
    ///
    /// Unknown or already released handles leave the pool untouched.
    pub fn release(&mut self, id: CarrierId) -> Result<(), PoolError> {
        let mut packet = self.on_loan.remove(id).ok_or(PoolError::NotOnLoan(id))?;
        packet.reset();
        self.idle.push(packet);
        Ok(())
    }

    /// Borrows a loaned carrier.
    #[must_use]
    pub fn get(&self, id: CarrierId) -> Option<&Packet> {
        self.on_loan.get(id)
    }

    /// Mutably borrows a loaned carrier.
    pub fn get_mut(&mut self, id: CarrierId) -> Option<&mut Packet> {
        self.on_loan.get_mut(id)
    }

    /// Iterates over every loaned carrier.
    pub fn iter(&self) -> impl Iterator<Item = (CarrierId, &Packet)> {
        self.on_loan.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (CarrierId, &mut Packet)> {
        self.on_loan.iter_mut()
    }

    /// Number of carriers waiting in the idle set.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    /// Number of carriers currently on loan.
    #[must_use]
    pub fn on_loan(&self) -> usize {
        self.on_loan.len()
    }

    /// Total carriers ever allocated by the pool.
    #[must_use]
    pub const fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carrier::CarrierState;

    fn acquire(pool: &mut PacketPool) -> CarrierId {
        pool.acquire(
            PacketType::Building,
            50.0,
            vec![BuildingId::new(0), BuildingId::new(1)],
            WorldPoint::new(1.0, 2.0),
        )
    }

    #[test]
    fn acquire_reinitialises_carrier() {
        let mut pool = PacketPool::with_capacity(1);
        let id = acquire(&mut pool);

        let packet = pool.get(id).expect("on loan");
        assert_eq!(packet.state(), CarrierState::Moving);
        assert_eq!(packet.current_index(), 0);
        assert_eq!(packet.position(), WorldPoint::new(1.0, 2.0));
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.on_loan(), 1);
    }

    #[test]
    fn grows_beyond_initial_capacity() {
        let mut pool = PacketPool::with_capacity(2);
        let ids: Vec<_> = (0..5).map(|_| acquire(&mut pool)).collect();

        assert_eq!(pool.high_water_mark(), 5);
        assert_eq!(pool.on_loan(), 5);

        for id in ids {
            pool.release(id).expect("release");
            assert!(pool.idle() + pool.on_loan() <= pool.high_water_mark());
        }
        assert_eq!(pool.idle(), 5);
    }

    #[test]
    fn double_release_is_rejected_without_corruption() {
        let mut pool = PacketPool::with_capacity(1);
        let id = acquire(&mut pool);

        assert_eq!(pool.release(id), Ok(()));
        assert_eq!(pool.release(id), Err(PoolError::NotOnLoan(id)));
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.on_loan(), 0);
    }

    #[test]
    fn stale_handle_does_not_alias_new_loan() {
        let mut pool = PacketPool::with_capacity(1);
        let stale = acquire(&mut pool);
        pool.release(stale).expect("release");

        let fresh = acquire(&mut pool);

        assert_ne!(stale, fresh);
        assert!(pool.get(stale).is_none());
        assert!(pool.release(stale).is_err());
        assert!(pool.get(fresh).is_some());
    }

    #[test]
    fn released_carrier_is_cleared() {
        let mut pool = PacketPool::with_capacity(0);
        let id = acquire(&mut pool);
        pool.release(id).expect("release");

        assert!(pool.idle.iter().all(|packet| packet.path.is_empty()
            && packet.state() == CarrierState::Idle));
    }
}
