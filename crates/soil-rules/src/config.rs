use serde::{Deserialize, Serialize};
use soil_types::paths;

use crate::error::{RulesError, RulesResult};

/// Vocabulary and scope of the compiled permission tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Type whose connection lists grant read access to connected users.
    pub identity_type: String,
    /// Field holding the immutable requester uid on remote-request records.
    pub remote_request_field: String,
    pub include_usernames: bool,
    pub include_tracking: bool,
    pub include_unverified_users: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            identity_type: "appUser".into(),
            remote_request_field: "remoteRequestUid".into(),
            include_usernames: true,
            include_tracking: true,
            include_unverified_users: true,
        }
    }
}

impl RulesConfig {
    /// Check that the configured names are usable as path segments.
    pub fn validate(&self) -> RulesResult<()> {
        paths::validate_segment(&self.identity_type, "identity type")
            .map_err(|err| RulesError::InvalidConfig(err.to_string()))?;
        paths::validate_segment(&self.remote_request_field, "remote request field")
            .map_err(|err| RulesError::InvalidConfig(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(RulesConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_segments() {
        let config = RulesConfig {
            identity_type: "app/user".into(),
            ..RulesConfig::default()
        };
        assert!(matches!(config.validate(), Err(RulesError::InvalidConfig(_))));
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: RulesConfig = serde_json::from_str(r#"{ "include_tracking": false }"#).unwrap();
        assert!(!config.include_tracking);
        assert_eq!(config.identity_type, "appUser");
    }
}
