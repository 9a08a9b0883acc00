#[must_use]
pub const fn bool_true() -> bool {
    true
}

/// Version of this node's software, reported to peers on every sync response.
pub const NODE_VERSION: &str = env!("CARGO_PKG_VERSION");
