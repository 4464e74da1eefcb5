//! Conventional defaults for well-known identity providers.

use crate::config::OidcConfig;

const KNOWN_PROVIDERS: &[&str] = &[
    "generic", "google", "microsoft", "keycloak", "auth0", "okta", "github",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresetError {
    #[error("unknown OIDC provider type '{0}'")]
    UnknownProvider(String),
    #[error("{0} OIDC requires 'issuer_url'")]
    MissingIssuer(String),
    #[error("unresolved placeholder in issuer_url '{0}'")]
    UnresolvedPlaceholder(String),
    #[error("invalid issuer_url '{url}': {reason}")]
    InvalidIssuer { url: String, reason: String },
    #[error("{0} OIDC requires 'client_id'")]
    MissingClientId(String),
}

/// Fill provider defaults into `config`. Returns true if a preset applied.
pub fn apply_preset(config: &mut OidcConfig) -> bool {
    let provider = config.provider_type.to_ascii_lowercase();
    let applied = match provider.as_str() {
        "" | "generic" => false,
        "google" => {
            default_issuer(config, "https://accounts.google.com");
            default_username(config, "email");
            true
        }
        "microsoft" => {
            default_issuer(config, "https://login.microsoftonline.com/{tenant}/v2.0");
            default_username(config, "preferred_username");
            true
        }
        "keycloak" => {
            default_username(config, "preferred_username");
            if config.role_claim_path.is_none() {
                config.role_claim_path = Some("realm_access.roles".to_string());
            }
            true
        }
        "auth0" => {
            default_issuer(config, "https://{domain}.auth0.com");
            default_username(config, "email");
            true
        }
        "okta" => {
            default_issuer(config, "https://{domain}.okta.com/oauth2/default");
            default_username(config, "preferred_username");
            true
        }
        "github" => {
            default_issuer(config, "https://github.com");
            default_username(config, "login");
            if config.scopes.is_empty() {
                config.scopes = vec!["read:user".to_string(), "user:email".to_string()];
            }
            tracing::warn!("GitHub tokens are OAuth 2.0, not OIDC; validation may fail");
            true
        }
        other => {
            tracing::warn!(provider = %other, "Unknown OIDC provider type");
            false
        }
    };

    if config.scopes.is_empty() {
        config.scopes = ["openid", "profile", "email"].map(String::from).to_vec();
    }

    config.issuer_url = substitute_placeholders(config);
    applied
}

/// Check a (preset-applied) provider configuration.
pub fn validate_provider_config(config: &OidcConfig) -> Result<(), PresetError> {
    let provider = match config.provider_type.to_ascii_lowercase() {
        p if p.is_empty() => "generic".to_string(),
        p => p,
    };
    if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
        return Err(PresetError::UnknownProvider(config.provider_type.clone()));
    }

    if config.issuer_url.is_empty() {
        return Err(PresetError::MissingIssuer(provider));
    }
    if has_placeholder(&config.issuer_url) {
        return Err(PresetError::UnresolvedPlaceholder(config.issuer_url.clone()));
    }
    if let Err(e) = url::Url::parse(&config.issuer_url) {
        return Err(PresetError::InvalidIssuer {
            url: config.issuer_url.clone(),
            reason: e.to_string(),
        });
    }

    if provider != "generic" && config.client_id.is_empty() {
        return Err(PresetError::MissingClientId(provider));
    }
    Ok(())
}

fn default_issuer(config: &mut OidcConfig, issuer: &str) {
    if config.issuer_url.is_empty() {
        config.issuer_url = issuer.to_string();
    }
}

fn default_username(config: &mut OidcConfig, claim: &str) {
    if config.username_claim.is_empty() || config.username_claim == "sub" {
        config.username_claim = claim.to_string();
    }
}

fn substitute_placeholders(config: &OidcConfig) -> String {
    config
        .placeholders
        .iter()
        .fold(config.issuer_url.clone(), |url, (name, value)| {
            url.replace(&format!("{{{name}}}"), value)
        })
}

fn has_placeholder(url: &str) -> bool {
    url.find('{')
        .is_some_and(|open| url[open..].contains('}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(kind: &str) -> OidcConfig {
        OidcConfig {
            provider_type: kind.to_string(),
            client_id: "gateway".to_string(),
            ..OidcConfig::default()
        }
    }

    #[test]
    fn test_google_preset() {
        let mut config = provider("google");
        assert!(apply_preset(&mut config));
        assert_eq!(config.issuer_url, "https://accounts.google.com");
        assert_eq!(config.username_claim, "email");
        assert_eq!(config.scopes, vec!["openid", "profile", "email"]);
        assert!(validate_provider_config(&config).is_ok());
    }

    #[test]
    fn test_microsoft_requires_tenant() {
        let mut config = provider("microsoft");
        apply_preset(&mut config);
        assert_eq!(
            validate_provider_config(&config),
            Err(PresetError::UnresolvedPlaceholder(
                "https://login.microsoftonline.com/{tenant}/v2.0".to_string()
            ))
        );

        let mut config = provider("microsoft");
        config.placeholders.insert("tenant".into(), "contoso".into());
        apply_preset(&mut config);
        assert_eq!(config.issuer_url, "https://login.microsoftonline.com/contoso/v2.0");
        assert_eq!(config.username_claim, "preferred_username");
        assert!(validate_provider_config(&config).is_ok());
    }

    #[test]
    fn test_keycloak_preset() {
        let mut config = provider("keycloak");
        config.issuer_url = "https://sso.example.com/realms/{realm}".into();
        config.placeholders.insert("realm".into(), "data".into());
        apply_preset(&mut config);

        assert_eq!(config.issuer_url, "https://sso.example.com/realms/data");
        assert_eq!(config.role_claim_path.as_deref(), Some("realm_access.roles"));
        assert!(validate_provider_config(&config).is_ok());
    }

    #[test]
    fn test_explicit_claims_kept() {
        let mut config = provider("okta");
        config.username_claim = "upn".into();
        config.placeholders.insert("domain".into(), "acme".into());
        apply_preset(&mut config);
        assert_eq!(config.username_claim, "upn");
        assert_eq!(config.issuer_url, "https://acme.okta.com/oauth2/default");
    }

    #[test]
    fn test_generic_validation() {
        let mut config = provider("generic");
        config.client_id.clear();
        assert!(!apply_preset(&mut config));
        assert_eq!(
            validate_provider_config(&config),
            Err(PresetError::MissingIssuer("generic".into()))
        );

        config.issuer_url = "https://idp.example.com".into();
        assert!(validate_provider_config(&config).is_ok());
    }

    #[test]
    fn test_named_provider_requires_client_id() {
        let mut config = provider("github");
        config.client_id.clear();
        apply_preset(&mut config);
        assert_eq!(
            validate_provider_config(&config),
            Err(PresetError::MissingClientId("github".into()))
        );
    }

    #[test]
    fn test_unknown_provider() {
        let mut config = provider("myspace");
        config.issuer_url = "https://idp.example.com".into();
        assert!(!apply_preset(&mut config));
        assert!(matches!(
            validate_provider_config(&config),
            Err(PresetError::UnknownProvider(_))
        ));
    }
}
