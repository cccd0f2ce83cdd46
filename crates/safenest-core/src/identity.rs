//! # Identifier Newtypes
//!
//! Every identifier the activation workflow handles is a distinct type.
//! All of them are opaque strings owned by the backend; the only local
//! rule is that they are non-empty after trimming.
//!
//! [`SecretToken`] carries bearer material (operator access tokens and the
//! long-lived device credential). It zeroizes its buffer on drop and its
//! `Debug` output is redacted so it can sit inside structs that are logged.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::ValidationError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create the identifier, rejecting empty or whitespace-only input.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let s = value.into();
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::EmptyIdentifier { kind: $kind });
                }
                Ok(Self(trimmed.to_string()))
            }

            /// Access the identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// The authenticated parent account that owns an activation.
    OperatorId,
    "operator id"
);
string_id!(
    /// A child profile owned by an operator.
    ChildId,
    "child id"
);
string_id!(
    /// An entry in the app catalog.
    AppId,
    "app id"
);
string_id!(
    /// A DNS-filtering profile provisioned for a household.
    DnsProfileId,
    "dns profile id"
);

/// Short-lived pairing code shown on a physical device.
///
/// Immutable for the lifetime of an activation session. Surrounding
/// whitespace is stripped; the code is otherwise opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceCode(String);

impl DeviceCode {
    /// Create a pairing code.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyDeviceCode`] for empty input.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let s = value.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyDeviceCode);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the pairing code string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bearer material: an operator access token or a device credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(Zeroizing<String>);

impl SecretToken {
    /// Wrap a token, rejecting empty input.
    ///
    /// `kind` names the secret in the resulting error.
    pub fn new(value: impl Into<String>, kind: &'static str) -> Result<Self, ValidationError> {
        let s: String = value.into();
        if s.trim().is_empty() {
            return Err(ValidationError::EmptySecret { kind });
        }
        Ok(Self(Zeroizing::new(s)))
    }

    /// Expose the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_code_trims_whitespace() {
        let code = DeviceCode::new("  ABCD-1234 \n").unwrap();
        assert_eq!(code.as_str(), "ABCD-1234");
        assert_eq!(code.to_string(), "ABCD-1234");
    }

    #[test]
    fn device_code_rejects_blank() {
        assert_eq!(DeviceCode::new("   "), Err(ValidationError::EmptyDeviceCode));
        assert_eq!(DeviceCode::new(""), Err(ValidationError::EmptyDeviceCode));
    }

    #[test]
    fn string_ids_reject_blank_with_kind() {
        assert_eq!(
            ChildId::new(""),
            Err(ValidationError::EmptyIdentifier { kind: "child id" })
        );
        assert_eq!(
            OperatorId::new(" "),
            Err(ValidationError::EmptyIdentifier { kind: "operator id" })
        );
    }

    #[test]
    fn string_ids_serialize_transparently() {
        let id = AppId::new("a1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"a1\"");
        let back: AppId = serde_json::from_str("\"a1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn secret_token_debug_is_redacted() {
        let token = SecretToken::new("tok123", "device credential").unwrap();
        let dbg = format!("{token:?}");
        assert!(!dbg.contains("tok123"));
        assert!(dbg.contains("REDACTED"));
        assert_eq!(token.expose(), "tok123");
    }

    #[test]
    fn secret_token_rejects_empty() {
        assert_eq!(
            SecretToken::new("", "device credential"),
            Err(ValidationError::EmptySecret {
                kind: "device credential"
            })
        );
    }
}
