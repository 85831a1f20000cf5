//! Pairwise holding overlap between funds.

pub mod engine;

pub use engine::{
    classify_overlap, compute_overlap, compute_overlap_report, compute_overlap_with,
    group_holdings, jaccard, latest_disclosure, weighted_overlap, Disclosure, OverlapFlag,
    OverlapPair, OverlapReport,
};
