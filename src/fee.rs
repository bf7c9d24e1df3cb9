use crate::protocol::message::{BoothId, Timestamp};

pub type Fee = i64;

const SECS_IN_MINUTE: f64 = 60.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("booth \"{0}\" is not a number")]
    InvalidBooth(BoothId),
}

/// Rates used to price a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub base_fee: i64,
    pub per_booth_rate: i64,
    pub per_minute_rate: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base_fee: 10,
            per_booth_rate: 5,
            per_minute_rate: 2,
        }
    }
}

impl FeeSchedule {
    /// Prices a trip from its entry and exit records
    ///
    /// `fee = base + |exit - entry| * per_booth + minutes * per_minute`,
    /// rounded half away from zero. The trip duration is signed: an exit
    /// stamped before its entry lowers the fee instead of being rejected.
    pub fn fee(
        &self,
        entry_booth: &BoothId,
        exit_booth: &BoothId,
        entry_time: Timestamp,
        exit_time: Timestamp,
    ) -> Result<Fee, FeeError> {
        let entry = booth_number(entry_booth)?;
        let exit = booth_number(exit_booth)?;

        let distance = exit.abs_diff(entry) as f64;
        let minutes = (exit_time - entry_time).num_seconds() as f64 / SECS_IN_MINUTE;

        let fee = self.base_fee as f64
            + distance * self.per_booth_rate as f64
            + minutes * self.per_minute_rate as f64;

        Ok(fee.round() as Fee)
    }
}

fn booth_number(booth: &BoothId) -> Result<i64, FeeError> {
    booth
        .number()
        .map_err(|_| FeeError::InvalidBooth(booth.clone()))
}
