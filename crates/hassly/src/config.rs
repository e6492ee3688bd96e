//! CLI configuration: thin wrapper around `hassly_config`.
//!
//! Re-exports the shared types and adds resolution that respects
//! `GlobalOpts` flag overrides (--url, --token, --cloud, --timeout).

use secrecy::SecretString;

use hassly_api::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use hassly_config::{
    Config, Profile, config_path, load_config_or_default, resolve_token, save_config,
    store_token, timeouts_from_secs,
};

/// Whether a command needs an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    Required,
    Optional,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build a `ClientConfig` from the active profile plus flag overrides.
///
/// Without a profile, `--url` (and `--token` when required) must be given.
pub fn resolve_client_config(
    config: &Config,
    profile_name: &str,
    global: &GlobalOpts,
    tokens: TokenPolicy,
) -> Result<ClientConfig, CliError> {
    let profile = config.profiles.get(profile_name);

    if profile.is_none() && global.profile.is_some() {
        let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name: profile_name.into(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        });
    }

    // No overrides: the profile alone decides.
    if let Some(p) = profile {
        let overridden = global.url.is_some()
            || global.token.is_some()
            || global.cloud
            || global.timeout.is_some();
        if !overridden && tokens == TokenPolicy::Required {
            return Ok(hassly_config::profile_to_client_config(
                p,
                profile_name,
                &config.defaults,
            )?);
        }
    }

    // 1. URL (flag > env > profile)
    let url = global
        .url
        .as_deref()
        .or(profile.map(|p| p.url.as_str()))
        .ok_or_else(|| CliError::NoConfig {
            path: config_path().display().to_string(),
        })?;

    // 2. Token (flag > env > profile chain)
    let token = resolve_token_with_flag(profile, profile_name, global, tokens)?;

    // 3. Cloud relay
    let cloud = global.cloud || profile.is_some_and(|p| p.cloud_relay);

    // 4. Timeout
    let timeout = global
        .timeout
        .or_else(|| profile.and_then(|p| p.timeout))
        .unwrap_or(config.defaults.timeout);

    let mut client_config = ClientConfig::new(Some(url), token, cloud)?;
    client_config.timeouts = timeouts_from_secs(timeout);
    Ok(client_config)
}

fn resolve_token_with_flag(
    profile: Option<&Profile>,
    profile_name: &str,
    global: &GlobalOpts,
    tokens: TokenPolicy,
) -> Result<Option<SecretString>, CliError> {
    if let Some(ref token) = global.token {
        return Ok(Some(SecretString::from(token.clone())));
    }

    let resolved = match profile {
        Some(p) => resolve_token(p, profile_name).map(Some),
        None => Err(hassly_config::ConfigError::NoCredentials {
            profile: profile_name.into(),
        }),
    };

    match (resolved, tokens) {
        (Ok(token), _) => Ok(token),
        (Err(_), TokenPolicy::Optional) => Ok(None),
        (Err(e), TokenPolicy::Required) => Err(e.into()),
    }
}
