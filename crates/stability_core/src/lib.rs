pub mod algorithms;
pub mod geometry;
pub mod guarantee;
pub mod registry;
/// The `stability_core` crate searches for stability guarantees of a classifier around an
/// input point `x*`: maximal regions provably free of counterexamples (sound guarantees) or
/// minimal regions known to contain every nearby point of the same decision (complete
/// approximations).
///
/// Key components:
/// - **Geometry**: `Interval` (axis-aligned box) and `InfCircle` (L∞ ball).
/// - **Guarantees**: `ParallelepipedalGuarantee` (per-coordinate bounds) and `CyclicGuarantee`
///   (a single radius), each exposing the refinement operations the searches rely on.
/// - **Traits**: `VerificationOracle` (the black-box verifier) and `Clock` (wall-clock source).
/// - **Algorithms**: top-down contraction, bottom-up expansion (linear, BFS, dichotomic) and their
///   compositions.
/// - **Registry**: the closed set of strategies and the factories that wire a guarantee to its search.
pub mod traits;
pub mod verification;
