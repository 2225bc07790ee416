use crate::{ids::error::PacketIdError, IdRange, PacketId};

/// Lower bound of the id block every Engine reserves for library use
pub const INTERNAL_RANGE_FROM: PacketId = -1_000_000;
/// Upper bound of the id block every Engine reserves for library use
pub const INTERNAL_RANGE_TO: PacketId = -999_000;

/// Tracks which packet ids are set aside for library-internal packets.
///
/// Two views are kept: the active ranges, which are what
/// [`allocate`](ReservedIds::allocate) draws from and which shrink over time,
/// and every range ever added, which is what
/// [`is_reserved`](ReservedIds::is_reserved) consults. An id stays rejected
/// for ordinary packets even after its active range was removed.
#[derive(Clone, Debug, Default)]
pub struct ReservedIds {
    active: Vec<IdRange>,
    all_time: Vec<IdRange>,
}

impl ReservedIds {
    pub fn new() -> Self {
        Self {
            active: Vec::new(),
            all_time: Vec::new(),
        }
    }

    pub fn with_ranges(ranges: &[IdRange]) -> Self {
        let mut output = Self::new();
        for range in ranges {
            output.add_range(*range);
        }
        output
    }

    /// Reserves a range. Empty ranges are ignored.
    pub fn add_range(&mut self, range: IdRange) {
        if range.is_empty() {
            return;
        }
        self.remove_range(&range);
        self.active.push(range);
        self.all_time.push(range);
    }

    /// Cuts `sub` out of every active range. Ids already reserved stay
    /// reserved for [`is_reserved`](ReservedIds::is_reserved).
    pub fn remove_range(&mut self, sub: &IdRange) {
        let mut remaining = Vec::with_capacity(self.active.len() + 1);
        for range in &self.active {
            remaining.extend(
                range
                    .subtract(sub)
                    .into_iter()
                    .filter(|piece| !piece.is_empty()),
            );
        }
        self.active = remaining;
    }

    pub fn is_reserved(&self, id: PacketId) -> bool {
        self.all_time.iter().any(|range| range.contains(id))
    }

    /// Hands out the lowest free id of the first active range
    pub fn allocate(&mut self) -> Result<PacketId, PacketIdError> {
        let Some(range) = self.active.first_mut() else {
            return Err(PacketIdError::IdSpaceExhausted);
        };
        let Some(id) = range.pop_id() else {
            // empty ranges are never stored
            self.active.remove(0);
            return Err(PacketIdError::IdSpaceExhausted);
        };
        if range.is_empty() {
            self.active.remove(0);
        }
        Ok(id)
    }

    /// Fails with `ReservedIdViolation` when `id` is reserved
    pub fn check(&self, id: PacketId) -> Result<(), PacketIdError> {
        if self.is_reserved(id) {
            return Err(PacketIdError::ReservedIdViolation { id });
        }
        Ok(())
    }

    pub fn active_ranges(&self) -> &[IdRange] {
        &self.active
    }

    pub fn all_time_ranges(&self) -> &[IdRange] {
        &self.all_time
    }
}
