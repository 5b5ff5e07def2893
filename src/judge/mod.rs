pub mod classify;
pub mod ratelimit;
pub mod service;
pub mod types;
pub mod validate;

pub use ratelimit::RateLimiter;
pub use service::CompilerService;
