use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    fee::{Fee, FeeError, FeeSchedule},
    protocol::message::{BoothId, Plate, Timestamp},
    stats::Statistics,
};

/// The fee basis of a vehicle that is currently on the highway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InTransit {
    pub entry_booth: BoothId,
    pub entry_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    New,
    // the vehicle was already on the highway, its previous record was discarded
    Replaced(InTransit),
}

/// A completed trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trip {
    pub entry_booth: BoothId,
    pub entry_time: Timestamp,
    pub fee: Fee,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExitError {
    #[error("the vehicle is not on the highway")]
    NotFound,

    #[error("{0}")]
    InvalidBooth(#[from] FeeError),
}

/// Tracks the vehicles that are currently on the highway
#[derive(Debug, Default)]
pub struct Ledger {
    // maps plate -> fee basis
    vehicles: HashMap<Plate, InTransit>,
    stats: Statistics,
    schedule: FeeSchedule,
}

impl Ledger {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self {
            schedule,
            ..Default::default()
        }
    }

    /// Records a vehicle entering the highway
    ///
    /// a vehicle that is already on the highway has its previous record overwritten
    pub fn record_entry(&mut self, plate: Plate, booth: BoothId, timestamp: Timestamp) -> Entry {
        let record = InTransit {
            entry_booth: booth,
            entry_time: timestamp,
        };

        match self.vehicles.insert(plate, record) {
            Some(previous) => Entry::Replaced(previous),
            None => {
                self.stats.vehicle_entered();
                Entry::New
            }
        }
    }

    /// Records a vehicle leaving the highway, and charges it
    ///
    /// nothing changes if the vehicle is not on the highway, or if the trip can't be priced.
    pub fn record_exit(
        &mut self,
        plate: &str,
        booth: &BoothId,
        timestamp: Timestamp,
    ) -> Result<Trip, ExitError> {
        let record = self.vehicles.get(plate).ok_or(ExitError::NotFound)?;
        let fee = self
            .schedule
            .fee(&record.entry_booth, booth, record.entry_time, timestamp)?;

        let InTransit {
            entry_booth,
            entry_time,
        } = self.vehicles.remove(plate).ok_or(ExitError::NotFound)?;
        self.stats.vehicle_exited(fee);

        Ok(Trip {
            entry_booth,
            entry_time,
            fee,
        })
    }

    pub fn stats(&self) -> Statistics {
        self.stats
    }

    pub fn in_transit(&self, plate: &str) -> Option<&InTransit> {
        self.vehicles.get(plate)
    }
}

/// A ledger shared between all the connections
///
/// every method holds the lock for the whole transaction, and returns the
/// statistics as they were right after it.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    ledger: Arc<Mutex<Ledger>>,
}

impl Collector {
    pub fn new(schedule: FeeSchedule) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new(schedule))),
        }
    }

    pub fn entry(&self, plate: Plate, booth: BoothId, timestamp: Timestamp) -> (Entry, Statistics) {
        let mut ledger = self.lock();
        let entry = ledger.record_entry(plate, booth, timestamp);
        (entry, ledger.stats())
    }

    pub fn exit(
        &self,
        plate: &str,
        booth: &BoothId,
        timestamp: Timestamp,
    ) -> (Result<Trip, ExitError>, Statistics) {
        let mut ledger = self.lock();
        let trip = ledger.record_exit(plate, booth, timestamp);
        (trip, ledger.stats())
    }

    pub fn snapshot(&self) -> Statistics {
        self.lock().stats()
    }

    // no transaction can panic half way through, so a poisoned ledger is still consistent
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
