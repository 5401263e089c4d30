//! Current OS user resolution.

use serde::Deserialize;

use crate::error::ConfError;

/// A source of the OS user the cluster runs as.
pub trait UserLookup {
    /// The name of the current OS user.
    fn username(&self) -> Result<String, ConfError>;
}

/// Resolves the current user from the `USER` environment variable.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvUser;

#[derive(Deserialize)]
struct UserEnv {
    user: String,
}

impl UserLookup for EnvUser {
    fn username(&self) -> Result<String, ConfError> {
        envy::from_env::<UserEnv>().map(|env| env.user).map_err(ConfError::CurrentUser)
    }
}

/// A fixed username, for callers which already know who they are.
#[derive(Clone, Debug)]
pub struct FixedUser(pub String);

impl UserLookup for FixedUser {
    fn username(&self) -> Result<String, ConfError> {
        Ok(self.0.clone())
    }
}
