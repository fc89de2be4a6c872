pub mod notification;
pub mod order;
pub mod request;

use serde::{Deserialize, Serialize};

/// Signed-in actor as exposed by the authentication context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub name: String,
    pub uid: String,
}

impl Actor {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        Self { username: username.into(), name: name.into(), uid: uid.into() }
    }

    /// Operator sessions (CLI, scripts) that only know a username.
    pub fn operator(username: impl Into<String>) -> Self {
        let username = username.into();
        Self { name: username.clone(), uid: format!("operator:{username}"), username }
    }
}
