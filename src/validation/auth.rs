use garde::Validate;
use serde::Deserialize;
use std::fmt;

use crate::models::session::Credentials;

/// The request payload for portal login.
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    /// The institutional email the SSO service knows the user by.
    #[garde(email, length(max = 255))]
    pub email: String,
    #[garde(length(min = 1, max = 128))]
    pub password: String,
}

impl LoginRequest {
    /// Moves the payload into `Credentials`, which wipe the password on drop.
    pub fn into_credentials(self) -> Credentials {
        Credentials::new(self.email.trim().to_string(), self.password)
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
