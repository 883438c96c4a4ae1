use std::env;

use super::error::{CouchDaoError, CouchResult};

const BASE_URL_VAR: &str = "COUCH_BASE_URL";
const DATABASE_VAR: &str = "COUCH_DB";
const USERNAME_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";

/// Where the shared game database lives and how to log into it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    /// Basic-auth user and password, used only when both are set.
    pub credentials: Option<(String, String)>,
}

impl CouchConfig {
    /// Read the connection from `COUCH_BASE_URL` and `COUCH_DB`, plus the
    /// optional `COUCH_USERNAME`/`COUCH_PASSWORD` pair.
    ///
    /// A missing required variable means the remote backend is not configured.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> CouchResult<Self> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.trim().is_empty())
                .ok_or(CouchDaoError::NotConfigured { var })
        };

        Ok(Self {
            base_url: required(BASE_URL_VAR)?,
            database: required(DATABASE_VAR)?,
            credentials: lookup(USERNAME_VAR).zip(lookup(PASSWORD_VAR)),
        })
    }
}
