//! Rate limiting logic and state management.

mod limiter;
mod permits;
mod registry;

pub use limiter::RateLimiter;
pub use registry::RateLimiterRegistry;
