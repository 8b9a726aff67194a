//! Form arithmetic: the shared formula table, the calculator that applies it,
//! and subscription-list tallies that feed list-backed sections

pub mod calculator;
pub mod formulas;
pub mod subscriptions;

pub use calculator::{recalculate, recalculate_library_year, round2};
pub use formulas::{layout, FormLayout, Rounding};
