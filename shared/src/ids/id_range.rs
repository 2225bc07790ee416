use std::fmt;

use crate::PacketId;

/// An interval over the signed packet id space, `from` and `to` inclusive.
///
/// Subtraction keeps the boundary ids of the piece being cut away, so
/// `[0,10] - [3,7]` leaves `[0,3]` and `[7,10]`. For allocation a range is
/// read as the half-open run `from..to` (see [`IdRange::pop_id`]), which is
/// what keeps neighbouring pieces from handing out the same id twice.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdRange {
    from: PacketId,
    to: PacketId,
}

impl IdRange {
    /// Creates a range; bounds given in the wrong order are swapped
    pub fn new(from: PacketId, to: PacketId) -> Self {
        if from <= to {
            Self { from, to }
        } else {
            Self { from: to, to: from }
        }
    }

    pub fn from(&self) -> PacketId {
        self.from
    }

    pub fn to(&self) -> PacketId {
        self.to
    }

    pub fn contains(&self, id: PacketId) -> bool {
        id >= self.from && id <= self.to
    }

    /// A range is empty once it has no ids left to allocate
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Number of ids this range can still hand out
    pub fn allocatable(&self) -> u64 {
        (i64::from(self.to) - i64::from(self.from)) as u64
    }

    pub fn overlaps(&self, other: &IdRange) -> bool {
        !(other.to < self.from || other.from > self.to)
    }

    /// Removes `sub` from this range.
    ///
    /// Returns zero, one or two pieces: nothing when `sub` covers the range,
    /// the range itself when they don't overlap, a trimmed range when `sub`
    /// overlaps one end, and two pieces when `sub` lies strictly inside.
    pub fn subtract(&self, sub: &IdRange) -> Vec<IdRange> {
        if sub.from <= self.from && sub.to >= self.to {
            Vec::new()
        } else if sub.to < self.from || sub.from > self.to {
            vec![*self]
        } else if sub.from <= self.from {
            vec![IdRange::new(sub.to, self.to)]
        } else if sub.to >= self.to {
            vec![IdRange::new(self.from, sub.from)]
        } else {
            vec![
                IdRange::new(self.from, sub.from),
                IdRange::new(sub.to, self.to),
            ]
        }
    }

    /// Takes the lowest allocatable id out of the range, or `None` if empty
    pub fn pop_id(&mut self) -> Option<PacketId> {
        if self.is_empty() {
            return None;
        }
        let id = self.from;
        self.from += 1;
        Some(id)
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}
