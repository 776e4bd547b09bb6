//! Member identifiers and their range partitioning.
//!
//! Every property or method of a dispatchable object is addressed by a
//! [`MemberId`], a stable 32-bit integer. The id space is split into three
//! disjoint ranges fixed at design time:
//!
//! - **builtin** — members declared by the object's class through reflection,
//! - **dynamic** — members added at runtime to a single instance,
//! - **custom** — a small class-reserved window handled entirely by class
//!   hooks (for example the `apply`/`call` surface of function wrappers).

/// Stable integer identifier of a member within an instance's namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub i32);

/// The reserved "default value" member. A `Get` of this id yields the
/// object's display string; `Construct` is only valid on this id.
pub const ID_VALUE: MemberId = MemberId(0);

/// Named-argument id marking the single value of a property assignment.
pub const ID_PUT: MemberId = MemberId(-3);

/// Named-argument id carrying an explicit receiver for a rebound call.
pub const ID_THIS: MemberId = MemberId(-613);

/// First id of the per-instance dynamic range.
pub const DYNAMIC_BASE: i32 = 0x5000_0000;
/// Last id of the per-instance dynamic range.
pub const DYNAMIC_MAX: i32 = 0x5fff_ffff;

/// First id of the class-custom range.
pub const CUSTOM_BASE: i32 = 0x6000_0000;
/// Last id of the class-custom range.
pub const CUSTOM_MAX: i32 = 0x6fff_ffff;

/// Which of the three id ranges a member id falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberRange {
    /// Reflected, class-declared member.
    Builtin,
    /// Runtime-added per-instance member.
    Dynamic,
    /// Class-reserved window handled by class hooks.
    Custom,
}

impl MemberId {
    /// Dynamic member id for a store slot index.
    #[inline]
    pub fn dynamic(slot: usize) -> MemberId {
        debug_assert!(slot <= (DYNAMIC_MAX - DYNAMIC_BASE) as usize);
        MemberId(DYNAMIC_BASE + slot as i32)
    }

    /// Custom member id for a class-reserved index.
    #[inline]
    pub fn custom(index: usize) -> MemberId {
        debug_assert!(index <= (CUSTOM_MAX - CUSTOM_BASE) as usize);
        MemberId(CUSTOM_BASE + index as i32)
    }

    /// Classify this id into its range.
    pub fn range(self) -> MemberRange {
        match self.0 {
            DYNAMIC_BASE..=DYNAMIC_MAX => MemberRange::Dynamic,
            CUSTOM_BASE..=CUSTOM_MAX => MemberRange::Custom,
            _ => MemberRange::Builtin,
        }
    }

    /// Slot index for a dynamic id, `None` for other ranges.
    pub fn dynamic_slot(self) -> Option<usize> {
        match self.range() {
            MemberRange::Dynamic => Some((self.0 - DYNAMIC_BASE) as usize),
            _ => None,
        }
    }

    /// Index within the class-custom window, `None` for other ranges.
    pub fn custom_index(self) -> Option<usize> {
        match self.range() {
            MemberRange::Custom => Some((self.0 - CUSTOM_BASE) as usize),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Identifier of a native capability that an object can be queried for.
///
/// A reflected parameter may be constrained to a capability; the engine
/// re-queries argument objects for it before a native call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CapabilityId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        assert_eq!(MemberId(1).range(), MemberRange::Builtin);
        assert_eq!(ID_VALUE.range(), MemberRange::Builtin);
        assert_eq!(MemberId(DYNAMIC_BASE).range(), MemberRange::Dynamic);
        assert_eq!(MemberId(DYNAMIC_MAX).range(), MemberRange::Dynamic);
        assert_eq!(MemberId(CUSTOM_BASE).range(), MemberRange::Custom);
        assert_eq!(MemberId(CUSTOM_MAX).range(), MemberRange::Custom);
    }

    #[test]
    fn dynamic_slot_round_trip() {
        let id = MemberId::dynamic(42);
        assert_eq!(id.dynamic_slot(), Some(42));
        assert_eq!(MemberId(1).dynamic_slot(), None);
    }

    #[test]
    fn custom_index_round_trip() {
        let id = MemberId::custom(1);
        assert_eq!(id.custom_index(), Some(1));
        assert_eq!(id.dynamic_slot(), None);
    }
}
