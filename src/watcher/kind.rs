//! Mutation kinds and the raw event mask.
//!
//! The bit layout follows the Linux inotify ABI. The low twelve bits are the
//! mutation kinds reported to users; the remaining flags are delivered by the
//! kernel alongside them and never appear in the log.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Raw event mask as delivered in each record header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MutationMask: u32 {
        const ACCESS = 0x0000_0001;
        const MODIFY = 0x0000_0002;
        const ATTRIB = 0x0000_0004;
        const CLOSE_WRITE = 0x0000_0008;
        const CLOSE_NOWRITE = 0x0000_0010;
        const OPEN = 0x0000_0020;
        const MOVED_FROM = 0x0000_0040;
        const MOVED_TO = 0x0000_0080;
        const CREATE = 0x0000_0100;
        const DELETE = 0x0000_0200;
        const DELETE_SELF = 0x0000_0400;
        const MOVE_SELF = 0x0000_0800;

        /// Backing filesystem was unmounted.
        const UNMOUNT = 0x0000_2000;
        /// Kernel event queue overflowed; events were dropped.
        const Q_OVERFLOW = 0x0000_4000;
        /// Watch was removed, explicitly or because the target went away.
        const IGNORED = 0x0000_8000;
        /// Subject of the event is a directory.
        const ISDIR = 0x4000_0000;
    }
}

impl MutationMask {
    /// Mask used for every registered directory unless configured otherwise.
    pub const DEFAULT_WATCH: MutationMask = MutationMask::CREATE
        .union(MutationMask::ATTRIB)
        .union(MutationMask::DELETE)
        .union(MutationMask::MOVED_FROM)
        .union(MutationMask::MOVED_TO);

    /// Only the twelve mutation-kind bits.
    pub const KINDS: MutationMask = MutationMask::from_bits_retain(0x0000_0fff);

    /// Iterate the mutation kinds set in this mask, lowest bit first.
    pub fn kinds(self) -> impl Iterator<Item = MutationKind> {
        MutationKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.mask()))
    }

    /// Build a mask from a list of kinds.
    pub fn from_kinds<'a>(kinds: impl IntoIterator<Item = &'a MutationKind>) -> Self {
        kinds
            .into_iter()
            .fold(MutationMask::empty(), |acc, kind| acc | kind.mask())
    }
}

/// One category of filesystem change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Access,
    Modify,
    AttributeChange,
    CloseWrite,
    CloseNoWrite,
    Open,
    MovedFrom,
    MovedTo,
    Create,
    Delete,
    DeleteSelf,
    MoveSelf,
}

impl MutationKind {
    /// All kinds in mask bit order.
    pub const ALL: [MutationKind; 12] = [
        MutationKind::Access,
        MutationKind::Modify,
        MutationKind::AttributeChange,
        MutationKind::CloseWrite,
        MutationKind::CloseNoWrite,
        MutationKind::Open,
        MutationKind::MovedFrom,
        MutationKind::MovedTo,
        MutationKind::Create,
        MutationKind::Delete,
        MutationKind::DeleteSelf,
        MutationKind::MoveSelf,
    ];

    /// The single mask bit for this kind.
    pub fn mask(self) -> MutationMask {
        MutationMask::from_bits_retain(1u32 << (self as u32))
    }

    /// Name written to the log file.
    pub fn log_name(self) -> &'static str {
        match self {
            MutationKind::Access => "IN_ACCESS",
            MutationKind::Modify => "IN_MODIFY",
            MutationKind::AttributeChange => "IN_ATTRIB",
            MutationKind::CloseWrite => "IN_CLOSE_WRITE",
            MutationKind::CloseNoWrite => "IN_CLOSE_NOWRITE",
            MutationKind::Open => "IN_OPEN",
            MutationKind::MovedFrom => "IN_MOVED_FROM",
            MutationKind::MovedTo => "IN_MOVED_TO",
            MutationKind::Create => "IN_CREATE",
            MutationKind::Delete => "IN_DELETE",
            MutationKind::DeleteSelf => "IN_DELETE_SELF",
            MutationKind::MoveSelf => "IN_MOVE_SELF",
        }
    }

    /// Whether this kind can bring a new entry into a watched directory.
    pub fn introduces_entry(self) -> bool {
        matches!(self, MutationKind::Create | MutationKind::MovedTo)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.log_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_bits_follow_declaration_order() {
        for (bit, kind) in MutationKind::ALL.iter().enumerate() {
            assert_eq!(kind.mask().bits(), 1 << bit, "{kind}");
        }
        assert_eq!(MutationKind::Create.mask(), MutationMask::CREATE);
        assert_eq!(MutationKind::MoveSelf.mask(), MutationMask::MOVE_SELF);
    }

    #[test]
    fn test_kinds_reports_every_set_bit() {
        let mask = MutationMask::CREATE | MutationMask::ATTRIB | MutationMask::ISDIR;
        let kinds: Vec<_> = mask.kinds().collect();

        // ISDIR is a flag, not a kind
        assert_eq!(
            kinds,
            vec![MutationKind::AttributeChange, MutationKind::Create]
        );
    }

    #[test]
    fn test_default_watch_mask() {
        let kinds: Vec<_> = MutationMask::DEFAULT_WATCH.kinds().collect();
        assert_eq!(
            kinds,
            vec![
                MutationKind::AttributeChange,
                MutationKind::MovedFrom,
                MutationKind::MovedTo,
                MutationKind::Create,
                MutationKind::Delete,
            ]
        );
        assert_eq!(MutationMask::DEFAULT_WATCH.bits(), 0x3c4);
    }

    #[test]
    fn test_from_kinds() {
        let mask = MutationMask::from_kinds(&[MutationKind::Delete, MutationKind::Open]);
        assert_eq!(mask, MutationMask::DELETE | MutationMask::OPEN);
        assert!(MutationMask::from_kinds(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_log_names() {
        assert_eq!(MutationKind::AttributeChange.to_string(), "IN_ATTRIB");
        assert_eq!(MutationKind::CloseNoWrite.log_name(), "IN_CLOSE_NOWRITE");
        assert!(MutationKind::MovedTo.introduces_entry());
        assert!(!MutationKind::MovedFrom.introduces_entry());
    }
}
