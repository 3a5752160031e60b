pub mod metrics;
pub mod rate_limit;
pub mod security_headers;
pub mod tracing;

pub use rate_limit::{IpRateLimiter, create_ip_rate_limiter, ip_rate_limit_middleware};
pub use security_headers::security_headers_middleware;
