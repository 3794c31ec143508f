use anyhow::{anyhow, Context, Error};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Identity holds the credentials used to sign requests to nimbus.io.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// The nimbus.io user name
    pub user_name: String,

    /// The numeric id of the authentication key
    pub auth_key_id: u64,

    /// The authentication key itself
    pub auth_key: String,
}

impl Identity {
    /// Create a new Identity
    ///
    /// Examples:
    ///
    /// ```
    /// # use nimbusio::Identity;
    /// let _ = Identity::new("my-user", 1, "my-auth-key");
    /// ```
    pub fn new<S1: Into<String>, S2: Into<String>>(
        user_name: S1,
        auth_key_id: u64,
        auth_key: S2,
    ) -> Identity {
        Identity {
            user_name: user_name.into(),
            auth_key_id,
            auth_key: auth_key.into(),
        }
    }

    /// Create a new Identity from environment variables:
    ///
    /// * `NIMBUS_IO_USER_NAME`
    /// * `NIMBUS_IO_AUTH_KEY_ID`
    /// * `NIMBUS_IO_AUTH_KEY`
    pub fn from_env() -> Result<Identity, Error> {
        let user_name = env::var("NIMBUS_IO_USER_NAME").context("NIMBUS_IO_USER_NAME")?;
        let auth_key_id = env::var("NIMBUS_IO_AUTH_KEY_ID")
            .context("NIMBUS_IO_AUTH_KEY_ID")?
            .trim()
            .parse()
            .context("NIMBUS_IO_AUTH_KEY_ID must be an integer")?;
        let auth_key = env::var("NIMBUS_IO_AUTH_KEY").context("NIMBUS_IO_AUTH_KEY")?;

        Ok(Identity {
            user_name,
            auth_key_id,
            auth_key,
        })
    }

    /// Read an identity file.  See [`Identity::parse`] for the format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Identity, Error> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading identity file {}", path.display()))?;
        Identity::parse(&text).with_context(|| format!("parsing identity file {}", path.display()))
    }

    /// Parse the text of an identity file: one `Name value` pair per line, with names
    /// `Username`, `AuthKeyId` and `AuthKey`.  Blank lines and lines starting with `#` are
    /// ignored, as are unrecognized names.
    ///
    /// ```
    /// # use nimbusio::Identity;
    /// let id = Identity::parse("Username motoboto\nAuthKeyId 3\nAuthKey abc123\n").unwrap();
    /// assert_eq!(id.auth_key_id, 3);
    /// ```
    pub fn parse(text: &str) -> Result<Identity, Error> {
        let mut user_name = None;
        let mut auth_key_id = None;
        let mut auth_key = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default().trim();
            match name {
                "Username" => user_name = Some(value.to_owned()),
                "AuthKeyId" => {
                    auth_key_id = Some(
                        value
                            .parse::<u64>()
                            .with_context(|| format!("invalid AuthKeyId {:?}", value))?,
                    )
                }
                "AuthKey" => auth_key = Some(value.to_owned()),
                _ => {}
            }
        }

        Ok(Identity {
            user_name: user_name.ok_or_else(|| anyhow!("identity is missing Username"))?,
            auth_key_id: auth_key_id.ok_or_else(|| anyhow!("identity is missing AuthKeyId"))?,
            auth_key: auth_key.ok_or_else(|| anyhow!("identity is missing AuthKey"))?,
        })
    }
}
