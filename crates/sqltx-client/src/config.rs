//! Connection configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Configuration for opening a database connection.
///
/// Built either programmatically or from a `key=value` connection string:
///
/// ```text
/// host=localhost port=5432 dbname=app user=worker password=secret
/// ```
///
/// Values containing whitespace or quotes are single-quoted, with `\'`
/// and `\\` escapes.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,

    /// Server port (default: 5432).
    pub port: u16,

    /// Database name.
    pub dbname: Option<String>,

    /// User name.
    pub user: Option<String>,

    /// Password.
    pub password: Option<String>,

    /// Application name (shown in server-side activity views).
    pub application_name: Option<String>,

    /// Connection timeout.
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: None,
            user: None,
            password: None,
            application_name: None,
            connect_timeout: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `key=value` connection string into configuration.
    pub fn from_conninfo(conninfo: &str) -> Result<Self> {
        let mut config = Self::default();

        for (key, value) in parse_pairs(conninfo)? {
            match key.as_str() {
                "host" => config.host = value,
                "port" => {
                    config.port = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid port: {value}")))?;
                }
                "dbname" => config.dbname = Some(value),
                "user" => config.user = Some(value),
                "password" => config.password = Some(value),
                "application_name" => config.application_name = Some(value),
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid timeout: {value}")))?;
                    config.connect_timeout = Some(Duration::from_secs(secs));
                }
                _ => {
                    // Ignore unknown options for forward compatibility
                    tracing::debug!(
                        key = key,
                        value = value,
                        "ignoring unknown connection string option"
                    );
                }
            }
        }

        Ok(config)
    }

    /// Render the configuration back into a connection string.
    ///
    /// This is the form handed to the driver's `connect`.
    #[must_use]
    pub fn conninfo(&self) -> String {
        let mut parts = vec![
            format!("host={}", quote_value(&self.host)),
            format!("port={}", self.port),
        ];
        if let Some(dbname) = &self.dbname {
            parts.push(format!("dbname={}", quote_value(dbname)));
        }
        if let Some(user) = &self.user {
            parts.push(format!("user={}", quote_value(user)));
        }
        if let Some(password) = &self.password {
            parts.push(format!("password={}", quote_value(password)));
        }
        if let Some(name) = &self.application_name {
            parts.push(format!("application_name={}", quote_value(name)));
        }
        if let Some(timeout) = &self.connect_timeout {
            parts.push(format!("connect_timeout={}", timeout.as_secs()));
        }
        parts.join(" ")
    }

    /// Set the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Set the user name.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name.
    #[must_use]
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Tokenize a connection string into `(key, value)` pairs.
fn parse_pairs(conninfo: &str) -> Result<Vec<(String, String)>> {
    let mut chars = conninfo.chars().peekable();
    let mut pairs = Vec::new();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
            key.push(c);
        }
        if key.is_empty() {
            return Err(Error::Config(format!(
                "expected a key at: {}",
                chars.collect::<String>()
            )));
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(Error::Config(format!("expected '=' after '{key}'")));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => {
                            return Err(Error::Config(format!(
                                "unterminated quoted value for '{key}'"
                            )));
                        }
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(Error::Config(format!(
                            "unterminated quoted value for '{key}'"
                        )));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
            if value.is_empty() {
                return Err(Error::Config(format!("missing value for '{key}'")));
            }
        }

        pairs.push((key, value));
    }
}

/// Quote a value if it needs it.
fn quote_value(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| !c.is_whitespace() && c != '\'' && c != '\\');
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_conninfo_parsing() {
        let config =
            Config::from_conninfo("host=db.internal port=5433 dbname=app user=worker").unwrap();

        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 5433);
        assert_eq!(config.dbname, Some("app".to_string()));
        assert_eq!(config.user, Some("worker".to_string()));
    }

    #[test]
    fn test_conninfo_quoted_values() {
        let config =
            Config::from_conninfo(r"dbname='my db' password='it\'s \\ here'").unwrap();

        assert_eq!(config.dbname, Some("my db".to_string()));
        assert_eq!(config.password, Some(r"it's \ here".to_string()));
    }

    #[test]
    fn test_conninfo_spaces_around_equals() {
        let config = Config::from_conninfo("dbname = app  host =db").unwrap();
        assert_eq!(config.dbname, Some("app".to_string()));
        assert_eq!(config.host, "db");
    }

    #[test]
    fn test_conninfo_invalid_port() {
        assert!(matches!(
            Config::from_conninfo("port=not-a-number"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_conninfo_missing_value() {
        assert!(Config::from_conninfo("dbname=").is_err());
        assert!(Config::from_conninfo("dbname").is_err());
    }

    #[test]
    fn test_conninfo_unknown_key_ignored() {
        let config = Config::from_conninfo("dbname=app sslmode=require").unwrap();
        assert_eq!(config.dbname, Some("app".to_string()));
    }

    #[test]
    fn test_conninfo_unterminated_quote() {
        assert!(Config::from_conninfo("dbname='app").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::new().password("secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***"));
    }

    proptest! {
        #[test]
        fn prop_conninfo_roundtrip(
            host in ".{0,12}",
            port in any::<u16>(),
            dbname in proptest::option::of(".{0,12}"),
            password in proptest::option::of(".{0,12}"),
            timeout_secs in proptest::option::of(0u64..86_400),
        ) {
            let mut config = Config::new().host(host).port(port);
            if let Some(dbname) = dbname {
                config = config.dbname(dbname);
            }
            if let Some(password) = password {
                config = config.password(password);
            }
            if let Some(secs) = timeout_secs {
                config = config.connect_timeout(Duration::from_secs(secs));
            }

            let reparsed = Config::from_conninfo(&config.conninfo()).unwrap();
            prop_assert_eq!(reparsed, config);
        }
    }
}
