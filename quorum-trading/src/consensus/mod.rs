//! Weighted analyst consensus.
//!
//! Turns a set of independent opinions on one subject into a single
//! recommendation with a vote tally, dissent and recurring themes.
//!
//! # Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Opinions (signal + confidence + factors/risks)                 │
//! │    ↓  effective weight = agent weight × confidence multiplier   │
//! │  Weighted score = Σ(score·w) / Σ(w)          ∈ [-100, 100]      │
//! │    ↓  threshold mapping                                         │
//! │  Final signal → dissenters, confidence, themes, narrative       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Aggregation is a pure function of its inputs: no I/O, no clock, no
//! shared state. Failed opinion calls upstream are simply absent from the
//! input; retrying them is the caller's job.

mod aggregator;

pub use aggregator::{
    ConsensusOutcome, Opinion, SignalAggregator, VoteTally, DISSENT_THRESHOLD, TOP_THEMES,
};
