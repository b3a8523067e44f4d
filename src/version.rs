// Build-time identity, reported on /version and sent as the HTTP source's User-Agent.

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NAME: &str = env!("CARGO_PKG_NAME");

pub fn user_agent() -> String {
    format!("{}/{}", NAME, VERSION)
}
