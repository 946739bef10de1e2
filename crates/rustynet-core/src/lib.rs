// =============================================================================
// RustyNet Core Library
// =============================================================================
//
// This is the entry point for the elastic-net regularization path solver.
// All the numerical heavy-lifting happens here - no binding code involved.
//
// STRUCTURE:
// ----------
// The library is organized into modules, each handling a specific concern:
//
//   - fit:         The six family entry points (elnet, lognet, fishnet,
//                  multnet, mrelnet, coxnet) and boundary validation
//   - families:    Loss linearizations (Gaussian, binomial, Poisson,
//                  multinomial, Cox) consumed by the kernel
//   - solvers:     Coordinate descent kernel, active set / strong rules,
//                  path driver, convergence, relaxed refit
//   - standardize: Column centering/scaling transform
//   - constants:   Shared numeric floors and caps
//   - error:       Error types used throughout the library
//
// FOR MAINTAINERS:
// ----------------
// When adding new functionality:
//   1. Add it to the appropriate module (or create a new one)
//   2. Write tests in that module (see existing tests for examples)
//   3. Re-export public items here so users can access them easily
//
// =============================================================================

// Declare our modules - each is in its own file or folder
pub mod constants;
pub mod convert;
pub mod error;
pub mod families;
pub mod fit;
pub mod solvers;
pub mod standardize;

// Re-export commonly used items at the top level for convenience
// Users can write `use rustynet_core::elnet` instead of
// `use rustynet_core::fit::elnet`
pub use error::{Result, RustyNetError};
pub use families::{Degeneracy, Family, TieMethod};
pub use fit::{coxnet, elnet, fishnet, lognet, mrelnet, multnet};
pub use solvers::{
    EarlyStop, ElasticNetPath, MultiPathPoint, MultiResponsePath, PathOptions, PathPoint,
    RelaxedFit,
};
pub use standardize::Standardization;
