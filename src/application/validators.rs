use std::collections::HashSet;

use once_cell::sync::Lazy;
use validator::ValidateEmail;

/// System accounts a hosting request may never claim.
static RESERVED_USERNAMES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "root", "bin", "daemon", "adm", "sync", "shutdown", "halt", "mail", "operator", "nobody",
        "postgres", "www-data", "apache", "sshd",
    ]
    .into_iter()
    .collect()
});

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a fully qualified domain name: lowercase labels separated by
/// dots, each 1-63 chars of [a-z0-9-], no leading/trailing hyphen, at least
/// two labels, 253 chars total.
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    })
}

/// Validates a Linux account / mailbox-local-part style name:
/// 1-32 chars, starts with a letter, [a-z0-9_-] thereafter, not reserved.
pub fn is_valid_system_username(name: &str) -> bool {
    if name.is_empty() || name.len() > 32 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    if !first.is_ascii_lowercase() {
        return false;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-') {
        return false;
    }
    !RESERVED_USERNAMES.contains(name)
}

/// Validates a database or database-role name: 1-63 chars, starts with a
/// letter, [a-z0-9_] thereafter. Interpolated into DDL, so strict.
pub fn is_valid_database_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }
    let mut chars = name.chars();
    let first = chars.next().unwrap();
    first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Derive the Linux account name for a hosting domain: the first label,
/// sanitized to the system-username alphabet.
pub fn system_username_for_domain(domain: &str) -> String {
    let first_label = domain.split('.').next().unwrap_or(domain);
    let mut name: String = first_label
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
        name.insert(0, 'u');
    }
    name.truncate(32);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_domains() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("a-b.co.uk"));
        assert!(is_valid_domain("xn--nxasmq6b.example"));
    }

    #[test]
    fn invalid_domains() {
        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("nodots"));
        assert!(!is_valid_domain("UPPER.com"));
        assert!(!is_valid_domain("-bad.com"));
        assert!(!is_valid_domain("bad-.com"));
        assert!(!is_valid_domain("sp ace.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
    }

    #[test]
    fn system_usernames() {
        assert!(is_valid_system_username("alice"));
        assert!(is_valid_system_username("web_1"));
        assert!(!is_valid_system_username("root"));
        assert!(!is_valid_system_username("1abc"));
        assert!(!is_valid_system_username("Alice"));
        assert!(!is_valid_system_username(&"a".repeat(33)));
    }

    #[test]
    fn database_names() {
        assert!(is_valid_database_name("shopdb"));
        assert!(is_valid_database_name("shop_db1"));
        assert!(!is_valid_database_name("1shop"));
        assert!(!is_valid_database_name("shop-db"));
        assert!(!is_valid_database_name("shop;drop table"));
    }

    #[test]
    fn derived_username_is_sanitized() {
        assert_eq!(system_username_for_domain("example.com"), "example");
        assert_eq!(system_username_for_domain("my-shop.de"), "my_shop");
        assert_eq!(system_username_for_domain("9lives.net"), "u9lives");
    }

    #[test]
    fn emails() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("notanemail"));
    }
}
