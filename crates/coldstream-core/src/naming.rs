//! Ledger-storage name resolution
//!
//! The storage layer names a ledger's backing resources with a flat
//! `tenant/namespace/domain/local-topic` encoding. Logs and stats want the
//! human-readable `domain://tenant/namespace/local-topic` form instead. This
//! is presentation only; nothing on the read path keys off the decoded name.

/// Resolve a ledger-storage name to a readable topic identifier.
///
/// Names that don't follow the four-segment persistence encoding are returned
/// unchanged, so callers can log whatever they were given.
pub fn topic_from_storage_name(storage_name: &str) -> String {
    let mut parts = storage_name.splitn(4, '/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(tenant), Some(namespace), Some(domain), Some(topic))
            if !tenant.is_empty() && !namespace.is_empty() && !domain.is_empty() && !topic.is_empty() =>
        {
            format!("{domain}://{tenant}/{namespace}/{topic}")
        }
        _ => storage_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_persistence_encoding() {
        assert_eq!(
            topic_from_storage_name("acme/orders/persistent/events"),
            "persistent://acme/orders/events"
        );
    }

    #[test]
    fn keeps_partition_suffix_in_local_name() {
        assert_eq!(
            topic_from_storage_name("acme/orders/persistent/events-partition-3"),
            "persistent://acme/orders/events-partition-3"
        );
    }

    #[test]
    fn passes_through_unrecognized_names() {
        assert_eq!(topic_from_storage_name("just-a-ledger"), "just-a-ledger");
        assert_eq!(topic_from_storage_name("a/b/c"), "a/b/c");
        assert_eq!(topic_from_storage_name(""), "");
    }
}
