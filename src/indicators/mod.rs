// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations over decimal closes. Every public
// function yields an empty result or `None` on insufficient data so callers
// are forced to handle short histories.

pub mod moving_average;
