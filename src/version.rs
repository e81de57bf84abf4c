// Build-time identity, shared by the HTTP surface and the statistics client

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// `User-Agent` sent to the statistics API.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
