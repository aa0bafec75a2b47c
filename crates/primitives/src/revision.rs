/// A named Ethereum protocol version.
///
/// Ordering matters: later revisions are numerically greater, so
/// `rev >= Revision::London` reads naturally at call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Revision {
    Frontier,
    Homestead,
    Tangerine,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Petersburg,
    Istanbul,
    Berlin,
    London,
    Paris,
    Shanghai,
    Cancun,
    Prague,
}

impl Revision {
    pub const LATEST: Revision = Revision::Prague;

    pub fn at_least(self, other: Revision) -> bool {
        self >= other
    }

    /// Gas cost for a single nonzero data byte, per §4.D.2 intrinsic gas table.
    pub fn nonzero_data_gas(self) -> u64 {
        if self.at_least(Revision::Istanbul) {
            16
        } else {
            68
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_fork_history() {
        assert!(Revision::London > Revision::Berlin);
        assert!(Revision::Frontier.at_least(Revision::Frontier));
        assert!(!Revision::Berlin.at_least(Revision::London));
    }

    #[test]
    fn nonzero_data_gas_changes_at_istanbul() {
        assert_eq!(Revision::Byzantium.nonzero_data_gas(), 68);
        assert_eq!(Revision::Istanbul.nonzero_data_gas(), 16);
        assert_eq!(Revision::Prague.nonzero_data_gas(), 16);
    }
}
