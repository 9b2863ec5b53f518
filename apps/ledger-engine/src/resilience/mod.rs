//! Resilience primitives: rate limiting, filesystem locks, liveness
//! probing, and the global trading guard.

mod file_lock;
mod guard;
mod liveness;
mod rate_limiter;

pub use file_lock::FileLock;
pub use guard::TradingGuard;
pub use liveness::{LivenessProbe, ProcLivenessProbe, StaticLivenessProbe};
pub use rate_limiter::RateLimiter;
