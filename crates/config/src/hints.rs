#[derive(Clone, Copy, Debug)]
pub struct ConfigHint {
    pub key: &'static str,
    pub description: &'static str,
}

pub const CONFIG_HINTS: &[ConfigHint] = &[
    ConfigHint {
        key: "node.name",
        description: "Name of this node, recorded as the source node of objects it originates.",
    },
    ConfigHint {
        key: "node.url",
        description: "Public url of this node, recorded as the source url of its master copies.",
    },
    ConfigHint {
        key: "server.listen",
        description: "Socket addresses the sync api listens on (e.g. 127.0.0.1:2529).",
    },
    ConfigHint {
        key: "datastore.path",
        description: "Database directory, relative to the node home.",
    },
    ConfigHint {
        key: "storage.path",
        description: "Storage folder root, relative to the node home.",
    },
    ConfigHint {
        key: "sync.require_auth",
        description: "Whether peers must present credentials of a [sync.users] account.",
    },
    ConfigHint {
        key: "sync.protocol_versions",
        description: "Sync protocol versions offered to and accepted from peers.",
    },
    ConfigHint {
        key: "sync.timeout_ms",
        description: "Timeout of a single request to a peer, in milliseconds.",
    },
    ConfigHint {
        key: "sync.interval_ms",
        description: "Period of outbound pulls, in milliseconds.",
    },
    ConfigHint {
        key: "sync.proxy_check_interval_ms",
        description: "Period of proxy reconciliation, in milliseconds.",
    },
    ConfigHint {
        key: "digest.min_age_ms",
        description: "Digests younger than this are never re-checked, in milliseconds.",
    },
    ConfigHint {
        key: "digest.max_age_ms",
        description: "Digests are re-checked once older than half this age, in milliseconds.",
    },
    ConfigHint {
        key: "digest.interval_ms",
        description: "Period of the digest freshness pass, in milliseconds.",
    },
];

#[must_use]
pub fn hint(key: &str) -> Option<&'static ConfigHint> {
    CONFIG_HINTS.iter().find(|hint| hint.key == key)
}
