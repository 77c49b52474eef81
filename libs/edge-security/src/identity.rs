use std::collections::HashSet;

/// Normalized authenticated principal derived from a verified token.
///
/// Never persisted; it lives as long as the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    /// Numeric-or-string `userId` claim rendered as a string. Empty when the claim is absent.
    user_id: String,
    /// Registered `sub` claim.
    subject: String,
    /// Role names in token order, duplicates removed.
    roles: Vec<String>,
}

impl Identity {
    /// Build an identity. Duplicate roles keep their first position.
    #[must_use]
    pub fn new(user_id: String, subject: String, roles: Vec<String>) -> Self {
        let mut seen: HashSet<String> = HashSet::with_capacity(roles.len());
        let mut ordered: Vec<String> = Vec::with_capacity(roles.len());
        for role in roles {
            if seen.insert(role.clone()) {
                ordered.push(role);
            }
        }

        Self {
            user_id,
            subject,
            roles: ordered,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Comma-joined role list as sent to upstream services.
    #[must_use]
    pub fn joined_roles(&self) -> String {
        self.roles.join(",")
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn roles_keep_token_order() {
        let identity = Identity::new(
            "42".to_owned(),
            "alice".to_owned(),
            vec!["ops".to_owned(), "admin".to_owned()],
        );

        assert_eq!(identity.roles(), &["ops", "admin"]);
        assert_eq!(identity.joined_roles(), "ops,admin");
    }

    #[test]
    fn duplicate_roles_collapse_to_first_occurrence() {
        let identity = Identity::new(
            String::new(),
            "bob".to_owned(),
            vec!["admin".to_owned(), "ops".to_owned(), "admin".to_owned()],
        );

        assert_eq!(identity.roles(), &["admin", "ops"]);
    }

    #[test]
    fn large_role_lists_dedup_in_order() {
        let roles: Vec<String> = (0..10_000).map(|i| format!("role-{}", i % 100)).collect();

        let identity = Identity::new(String::new(), "dave".to_owned(), roles);

        assert_eq!(identity.roles().len(), 100);
        assert_eq!(identity.roles()[0], "role-0");
        assert_eq!(identity.roles()[99], "role-99");
    }

    #[test]
    fn empty_roles_join_to_empty_string() {
        let identity = Identity::new(String::new(), "carol".to_owned(), Vec::new());

        assert!(identity.roles().is_empty());
        assert_eq!(identity.joined_roles(), "");
        assert_eq!(identity.user_id(), "");
    }
}
