//! Per-request database credentials
//!
//! [`ConnectionParams`] is what arrives on the wire: every field optional,
//! the port either a number or a string. [`ConnectionDescriptor`] is the
//! validated form the rest of the pipeline works with.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Port as sent by clients: `3306` or `"3306"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u64),
    Text(String),
}

/// Unvalidated connection object from a request body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<PortValue>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionParams {
    /// True when the client sent `{}` or only blank fields
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        let port_blank = match &self.port {
            None => true,
            Some(PortValue::Text(s)) => s.trim().is_empty(),
            Some(PortValue::Number(_)) => false,
        };
        blank(&self.host) && port_blank && blank(&self.user) && blank(&self.password) && blank(&self.database)
    }
}

/// Validated credentials for one request. Never persisted, never logged.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl ConnectionDescriptor {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// `host:port/database`, safe to put in logs and error messages
    pub fn display_target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

// Password stays out of Debug output so descriptors can't leak via `{:?}`.
impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl TryFrom<ConnectionParams> for ConnectionDescriptor {
    type Error = PipelineError;

    fn try_from(params: ConnectionParams) -> Result<Self, Self::Error> {
        let host = required(params.host, "host")?;
        let user = required(params.user, "user")?;
        let database = required(params.database, "database")?;
        let port = parse_port(params.port)?;

        Ok(ConnectionDescriptor {
            host,
            port,
            user,
            password: params.password.unwrap_or_default(),
            database,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, PipelineError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(PipelineError::InvalidRequest(format!(
            "connection field '{}' is missing",
            field
        ))),
    }
}

fn parse_port(value: Option<PortValue>) -> Result<u16, PipelineError> {
    let invalid = |raw: String| {
        PipelineError::InvalidRequest(format!("connection field 'port' is not a valid port: {}", raw))
    };

    let port = match value {
        None => {
            return Err(PipelineError::InvalidRequest(
                "connection field 'port' is missing".to_string(),
            ))
        }
        Some(PortValue::Number(n)) => u16::try_from(n).map_err(|_| invalid(n.to_string()))?,
        Some(PortValue::Text(s)) if s.trim().is_empty() => {
            return Err(PipelineError::InvalidRequest(
                "connection field 'port' is missing".to_string(),
            ))
        }
        Some(PortValue::Text(s)) => s.trim().parse::<u16>().map_err(|_| invalid(s.clone()))?,
    };

    if port == 0 {
        return Err(invalid("0".to_string()));
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> ConnectionParams {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_port_accepts_number_and_string() {
        let a = ConnectionDescriptor::try_from(params(
            r#"{"host":"db","port":3306,"user":"app","password":"pw","database":"shop"}"#,
        ))
        .unwrap();
        let b = ConnectionDescriptor::try_from(params(
            r#"{"host":"db","port":"3306","user":"app","password":"pw","database":"shop"}"#,
        ))
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.port, 3306);
    }

    #[test]
    fn test_missing_field_is_named() {
        let err = ConnectionDescriptor::try_from(params(
            r#"{"host":"db","port":3306,"password":"pw","database":"shop"}"#,
        ))
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidRequest("connection field 'user' is missing".to_string())
        );
    }

    #[test]
    fn test_bad_port_rejected() {
        for port in [r#""abc""#, "70000", "0", r#""""#] {
            let json = format!(
                r#"{{"host":"db","port":{},"user":"app","database":"shop"}}"#,
                port
            );
            let err = ConnectionDescriptor::try_from(params(&json)).unwrap_err();
            assert_eq!(err.stage(), "invalid_request", "port {}", port);
        }
    }

    #[test]
    fn test_empty_password_allowed() {
        let desc = ConnectionDescriptor::try_from(params(
            r#"{"host":"db","port":3306,"user":"root","database":"shop"}"#,
        ))
        .unwrap();
        assert_eq!(desc.password, "");
    }

    #[test]
    fn test_debug_redacts_password() {
        let desc = ConnectionDescriptor::new("db", 3306, "app", "hunter2", "shop");
        let debug = format!("{:?}", desc);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(desc.display_target(), "db:3306/shop");
    }

    #[test]
    fn test_is_empty() {
        assert!(params("{}").is_empty());
        assert!(params(r#"{"host":"","port":"","user":"","password":"","database":""}"#).is_empty());
        assert!(!params(r#"{"port":3306}"#).is_empty());
    }
}
