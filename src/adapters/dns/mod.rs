use std::net::SocketAddr;

use hickory_resolver::TokioResolver;
use hickory_resolver::config::{NameServerConfig, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::proto::xfer::Protocol;
use tracing::{debug, warn};

/// Best-effort check that a freshly created zone actually resolves; used by
/// the DNS provisioner after zone creation. Lookup failures are reported as
/// `false`, never as errors.
pub struct HickoryZoneChecker {
    resolver: TokioResolver,
}

impl HickoryZoneChecker {
    /// Create resolver using system DNS configuration.
    pub fn new() -> Self {
        let resolver = TokioResolver::builder_tokio().unwrap().build();
        Self { resolver }
    }

    /// Create resolver pointing to a specific DNS server (the authoritative
    /// server the panel manages, or a local resolver in development).
    pub fn with_nameserver(addr: SocketAddr) -> Self {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(addr, Protocol::Udp));

        let resolver =
            TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        Self { resolver }
    }

    pub async fn zone_has_soa(&self, domain: &str) -> bool {
        // Append trailing dot to make it an FQDN and prevent search domain appending
        let fqdn = if domain.ends_with('.') {
            domain.to_string()
        } else {
            format!("{}.", domain)
        };

        match self.resolver.lookup(&fqdn, RecordType::SOA).await {
            Ok(lookup) => {
                let found = lookup
                    .records()
                    .iter()
                    .any(|record| record.data().as_soa().is_some());
                debug!(domain = %domain, found, "SOA lookup");
                found
            }
            Err(e) => {
                warn!(domain = %domain, error = %e, "SOA lookup failed");
                false
            }
        }
    }
}

impl Default for HickoryZoneChecker {
    fn default() -> Self {
        Self::new()
    }
}
