//! Client implementation for the JWT `AuthN` resolver plugin.
//!
//! Implements `AuthNResolverClient` using the domain service.

use async_trait::async_trait;
use authn_resolver_sdk::{AuthNResolverClient, AuthOutcome};

use super::service::JwtAuthNResolver;

#[async_trait]
impl AuthNResolverClient for JwtAuthNResolver {
    async fn authenticate(&self, bearer_token: &str) -> AuthOutcome {
        self.resolve(bearer_token)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;

    use authn_resolver_sdk::RejectionKind;
    use jsonwebtoken::Algorithm;

    use super::*;
    use crate::domain::clock::FixedClock;
    use crate::domain::codec::VerificationKey;

    #[tokio::test]
    async fn trait_object_rejects_garbage() {
        let key =
            VerificationKey::from_secret(b"0123456789abcdef0123456789abcdef", Algorithm::HS256, 0)
                .unwrap();
        let resolver = JwtAuthNResolver::new(key, Arc::new(FixedClock::at_timestamp(0)));
        let client: Arc<dyn AuthNResolverClient> = Arc::new(resolver);

        let outcome = client.authenticate("garbage").await;
        assert_eq!(
            outcome.rejection().map(authn_resolver_sdk::Rejection::kind),
            Some(RejectionKind::Malformed)
        );
    }
}
