//! Static credentials

use std::fmt;

/// Username/password pair configured on the listening address
///
/// The password may be empty. `Debug` and `Display` never print it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Expected username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Expected password
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Check presented credentials against the expected pair
    ///
    /// Both fields are always compared so the result does not leak which
    /// one was wrong through timing.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(self.username.as_bytes(), username.as_bytes());
        let pass_ok = constant_time_eq(self.password.as_bytes(), password.as_bytes());
        user_ok & pass_ok
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:***", self.username)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify() {
        let creds = Credentials::new("alice", "secret");
        assert!(creds.verify("alice", "secret"));
        assert!(!creds.verify("alice", "secreT"));
        assert!(!creds.verify("bob", "secret"));
        assert!(!creds.verify("alice", ""));
    }

    #[test]
    fn test_empty_password() {
        let creds = Credentials::new("alice", "");
        assert!(creds.verify("alice", ""));
        assert!(!creds.verify("alice", "x"));
    }

    #[test]
    fn test_password_not_printed() {
        let creds = Credentials::new("alice", "secret");
        assert!(!format!("{:?}", creds).contains("secret"));
        assert_eq!(creds.to_string(), "alice:***");
    }
}
