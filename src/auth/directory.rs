//! Fixed user directory backed by static bearer tokens.

use std::collections::HashMap;
use std::fmt;

use axum::http::HeaderMap;

use super::{Authenticator, credential_token};
use crate::config::ConfigError;
use crate::domain::{Identity, UserId};

/// One configured account.
#[derive(Clone, PartialEq, Eq)]
pub struct UserAccount {
    /// Stable user id.
    pub id: UserId,
    /// Login name: 3–32 ASCII letters, digits or underscores.
    pub username: String,
    /// Name shown to other users.
    pub display_name: String,
    /// Secret presented as bearer token or `session` cookie.
    pub token: String,
}

impl fmt::Debug for UserAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAccount")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl UserAccount {
    /// Parses `id:username:display name:token` entries separated by `;`.
    ///
    /// The display name may itself contain `:`; the token is everything
    /// after the last one. Blank entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UserEntry`] for a malformed entry, an invalid
    /// username, or a duplicated id or token.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        let mut accounts: Vec<Self> = Vec::new();
        for entry in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let account = Self::parse(entry)?;
            if accounts.iter().any(|a| a.id == account.id) {
                return Err(user_error(entry, "duplicate user id"));
            }
            if accounts.iter().any(|a| a.token == account.token) {
                return Err(user_error(entry, "duplicate token"));
            }
            accounts.push(account);
        }
        Ok(accounts)
    }

    fn parse(entry: &str) -> Result<Self, ConfigError> {
        let mut parts = entry.splitn(3, ':');
        let (Some(id), Some(username), Some(rest)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(user_error(entry, "expected id:username:display:token"));
        };
        let Some((display_name, token)) = rest.rsplit_once(':') else {
            return Err(user_error(entry, "expected id:username:display:token"));
        };

        let id: i64 = id
            .trim()
            .parse()
            .map_err(|_| user_error(entry, "id is not an integer"))?;
        let username = username.trim();
        if !(3..=32).contains(&username.len())
            || !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(user_error(
                entry,
                "username must be 3-32 letters, digits or underscores",
            ));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > 64 {
            return Err(user_error(entry, "display name must be 1-64 characters"));
        }
        let token = token.trim();
        if token.is_empty() {
            return Err(user_error(entry, "token is empty"));
        }

        Ok(Self {
            id: UserId::new(id),
            username: username.to_string(),
            display_name: display_name.to_string(),
            token: token.to_string(),
        })
    }

    /// Identity presented to the rest of the service.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.id, self.display_name.clone())
    }
}

fn user_error(entry: &str, reason: &'static str) -> ConfigError {
    // Never echo the token back into logs.
    let entry = entry
        .rsplit_once(':')
        .map_or(entry, |(head, _)| head)
        .to_string();
    ConfigError::UserEntry { entry, reason }
}

/// In-memory directory of the fixed user group.
#[derive(Debug, Default)]
pub struct UserDirectory {
    by_id: HashMap<UserId, UserAccount>,
    by_token: HashMap<String, UserId>,
}

impl UserDirectory {
    /// Builds a directory from configured accounts.
    #[must_use]
    pub fn new(accounts: impl IntoIterator<Item = UserAccount>) -> Self {
        let mut dir = Self::default();
        for account in accounts {
            dir.by_token.insert(account.token.clone(), account.id);
            dir.by_id.insert(account.id, account);
        }
        dir
    }

    /// Looks up an account by id.
    #[must_use]
    pub fn get(&self, id: UserId) -> Option<&UserAccount> {
        self.by_id.get(&id)
    }

    /// Every account except `viewer`, ordered by id.
    #[must_use]
    pub fn list_except(&self, viewer: UserId) -> Vec<&UserAccount> {
        let mut accounts: Vec<&UserAccount> =
            self.by_id.values().filter(|a| a.id != viewer).collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Number of configured accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if no accounts are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Authenticator for UserDirectory {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = credential_token(headers)?;
        let id = self.by_token.get(token)?;
        self.by_id.get(id).map(UserAccount::identity)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::HeaderValue;
    use axum::http::header::AUTHORIZATION;

    use super::*;

    fn make_directory() -> UserDirectory {
        let Ok(accounts) = UserAccount::parse_list("1:alice:Alice: Liddell:tok-a; 2:bob:Bob:tok-b")
        else {
            panic!("valid user list");
        };
        UserDirectory::new(accounts)
    }

    fn bearer(token: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) else {
            panic!("valid header");
        };
        headers.insert(AUTHORIZATION, value);
        headers
    }

    #[test]
    fn display_name_may_contain_colons() {
        let dir = make_directory();
        let Some(alice) = dir.get(UserId::new(1)) else {
            panic!("alice configured");
        };
        assert_eq!(alice.display_name, "Alice: Liddell");
        assert_eq!(alice.token, "tok-a");
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn valid_token_authenticates() {
        let dir = make_directory();
        let identity = dir.authenticate(&bearer("tok-b"));
        assert_eq!(identity, Some(Identity::new(UserId::new(2), "Bob")));
    }

    #[test]
    fn unknown_token_is_rejected() {
        let dir = make_directory();
        assert!(dir.authenticate(&bearer("nope")).is_none());
        assert!(dir.authenticate(&HeaderMap::new()).is_none());
    }

    #[test]
    fn list_except_omits_viewer_and_orders_by_id() {
        let Ok(accounts) = UserAccount::parse_list("3:carol:Carol:tc;1:alice:Alice:ta;2:bob:Bob:tb")
        else {
            panic!("valid user list");
        };
        let dir = UserDirectory::new(accounts);
        let names: Vec<&str> = dir
            .list_except(UserId::new(2))
            .iter()
            .map(|a| a.username.as_str())
            .collect();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn malformed_entries_are_rejected() {
        assert!(UserAccount::parse_list("1:alice:Alice").is_err());
        assert!(UserAccount::parse_list("x:alice:Alice:tok").is_err());
        assert!(UserAccount::parse_list("1:al:Alice:tok").is_err());
        assert!(UserAccount::parse_list("1:alice::tok").is_err());
        assert!(UserAccount::parse_list("1:alice:Alice:").is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        assert!(UserAccount::parse_list("1:alice:Alice:t1;1:bob:Bob:t2").is_err());
        assert!(UserAccount::parse_list("1:alice:Alice:t1;2:bob:Bob:t1").is_err());
    }

    #[test]
    fn errors_do_not_leak_tokens() {
        let Err(err) = UserAccount::parse_list("1:alice:Alice:s3cret;1:bob:Bob:other") else {
            panic!("duplicate id must fail");
        };
        assert!(!err.to_string().contains("other"));
    }

    #[test]
    fn debug_redacts_token() {
        let dir = make_directory();
        let Some(alice) = dir.get(UserId::new(1)) else {
            panic!("alice configured");
        };
        assert!(!format!("{alice:?}").contains("tok-a"));
    }
}
