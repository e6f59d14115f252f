pub mod daily_cap;
pub mod dedupe;
pub mod gatekeeper;
pub mod preferences;
pub mod send_log;
pub mod tokens;

pub use gatekeeper::Gatekeeper;
