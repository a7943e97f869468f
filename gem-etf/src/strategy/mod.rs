//! Momentum strategy.
//!
//! Implements the Generalized Momentum (dual momentum) monthly allocation
//! rule over four asset roles.

mod decision;
mod gem;

pub use decision::{Decision, Mode, MomentumSet};
pub use gem::decide;
