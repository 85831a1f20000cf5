use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Units};

/// An unconsumed (or partly consumed) purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub acquisition_date: NaiveDate,
    pub units_remaining: Units,
    pub cost_per_unit: Money,
}

/// Units taken from one lot by a redemption
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LotSlice {
    pub acquisition_date: NaiveDate,
    pub units: Units,
    pub cost_per_unit: Money,
}

impl LotSlice {
    pub fn cost(&self) -> Money {
        self.units * self.cost_per_unit
    }
}

/// FIFO ledger for one fund.
///
/// Lots live in a growable arena in acquisition order; `head` points at the
/// oldest lot that still has units. Consumed lots stay in the arena with
/// `units_remaining == 0` and are never revisited.
#[derive(Debug, Clone, Default)]
pub struct LotQueue {
    lots: Vec<Lot>,
    head: usize,
}

impl LotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, acquisition_date: NaiveDate, units: Units, cost_per_unit: Money) {
        self.lots.push(Lot {
            acquisition_date,
            units_remaining: units,
            cost_per_unit,
        });
    }

    /// Open lots, oldest first
    pub fn open_lots(&self) -> &[Lot] {
        &self.lots[self.head..]
    }

    pub fn available(&self) -> Units {
        self.open_lots().iter().map(|l| l.units_remaining).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.lots.len()
    }

    /// Take `units` from the front of the queue.
    ///
    /// Returns `None` and leaves the ledger untouched when no lot is open or
    /// `units` exceeds what is available by more than `tolerance`. A
    /// shortfall within `tolerance` is absorbed: every open lot is consumed.
    pub fn consume(&mut self, units: Units, tolerance: Units) -> Option<Vec<LotSlice>> {
        if self.is_empty() || units > self.available() + tolerance {
            return None;
        }

        let mut need = units;
        let mut slices = Vec::new();
        while need > Decimal::ZERO && self.head < self.lots.len() {
            let lot = &mut self.lots[self.head];
            let take = need.min(lot.units_remaining);
            lot.units_remaining -= take;
            need -= take;
            slices.push(LotSlice {
                acquisition_date: lot.acquisition_date,
                units: take,
                cost_per_unit: lot.cost_per_unit,
            });
            if lot.units_remaining.is_zero() {
                self.head += 1;
            }
        }
        Some(slices)
    }
}
