//! FIFO capital-gains engine. Lots are matched per fund and gains are
//! aggregated by April-March financial year.

pub mod calendar;
pub mod engine;
pub mod liability;
pub mod lots;

pub use calendar::{CategoryLookup, FinancialYear};
pub use engine::{compute_tax_events, GainClass, LotConsumption, TaxEvent, TaxRun};
pub use liability::{
    estimate_unrealised, summarize_liability, FinancialYearLiability, UnrealisedPosition,
    UnrealisedRun,
};
pub use lots::{Lot, LotQueue};
