use serde::{Deserialize, Serialize};

/// How this node identifies itself on objects it originates.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[non_exhaustive]
pub struct LocalNode {
    pub name: String,
    pub url: Option<String>,
}

impl LocalNode {
    #[must_use]
    pub const fn new(name: String, url: Option<String>) -> Self {
        Self { name, url }
    }
}
