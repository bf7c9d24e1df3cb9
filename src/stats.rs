use std::fmt;

use crate::fee::Fee;

/// Aggregated counters of the whole highway
///
/// only ever changed by the ledger, in the same critical section as the
/// transition that caused the change.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    /// vehicles currently on the highway
    pub current_count: u64,
    /// vehicles that have left the highway
    pub total_vehicles: u64,
    /// sum of all the fees that were collected
    pub total_fees: Fee,
}

impl Statistics {
    pub(crate) fn vehicle_entered(&mut self) {
        self.current_count += 1;
    }

    pub(crate) fn vehicle_exited(&mut self, fee: Fee) {
        self.current_count = self.current_count.saturating_sub(1);
        self.total_vehicles += 1;
        self.total_fees += fee;
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current: {}, total vehicles: {}, total fees: {}",
            self.current_count, self.total_vehicles, self.total_fees
        )
    }
}
