//! Authentication: credential types and SigV4 query signing.

mod sigv4;

pub use sigv4::{generate_signed_query_parameters, SigV4QueryParameters};

/// An AWS credential triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
}

impl AwsCredentials {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.into(),
        }
    }
}
