//! Per-client sliding window rate limiting and its HTTP middleware.

mod client_key;
mod clock;
mod layer;
mod limiter;
mod sweep;
mod window;

pub use client_key::{ClientKeyExtractor, ClientKeyStrategy, FORWARDED_FOR, UNKNOWN_CLIENT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use layer::{throttle, RateLimitGate};
pub use limiter::RateLimiter;
pub use sweep::spawn_sweeper;
pub use window::{Decision, WindowState};
