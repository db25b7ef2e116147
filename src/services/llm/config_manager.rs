//! Multi-profile LLM configuration with provider-aware key resolution.
//!
//! Profiles live in the `llm_config_profiles` table; the active profile name
//! is a separate `app_settings` key. Secrets resolve environment-first and
//! fall back to the persisted value. This module is the only place outside
//! the bootstrap that reads the process environment.

use sqlx::{FromRow, SqlitePool};

use super::models::{ApiKey, LLMError, LlmProfile, Provider, UpsertProfileRequest, mask_api_key};

const ACTIVE_CONFIG_KEY: &str = "active_llm_config";

#[derive(Debug, FromRow)]
struct ProfileRow {
    name: String,
    provider: String,
    api_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: i64,
    timeout_seconds: i64,
    system_prompt: Option<String>,
    custom_config: Option<String>,
}

const PROFILE_COLUMNS: &str = "name, provider, api_url, model, api_key, temperature, \
     max_tokens, timeout_seconds, system_prompt, custom_config";

#[derive(Clone)]
pub struct LLMConfigManager {
    pool: SqlitePool,
}

impl LLMConfigManager {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All profile names, sorted.
    pub async fn get_config_names(&self) -> Result<Vec<String>, LLMError> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM llm_config_profiles ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    /// Load one profile with its key resolved (environment first, stored
    /// value as fallback).
    pub async fn get_config(&self, name: &str) -> Result<Option<LlmProfile>, LLMError> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM llm_config_profiles WHERE name = ?",
            PROFILE_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            tracing::warn!("Config profile '{}' not found", name);
            return Ok(None);
        };

        Ok(Some(self.profile_from_row(row)))
    }

    /// Create or replace a profile. The provider hint is stored alongside,
    /// inferred from name/url when the caller does not give one.
    pub async fn add_or_update_config(
        &self,
        name: &str,
        req: &UpsertProfileRequest,
    ) -> Result<bool, LLMError> {
        let name = name.trim();
        if name.is_empty() {
            tracing::error!("Rejected profile save: empty name");
            return Err(LLMError::EmptyProfileName);
        }

        let provider = req
            .provider
            .unwrap_or_else(|| Provider::infer(name, &req.api_url));

        let api_key_json = req
            .api_key
            .as_ref()
            .map(|k| serde_json::to_string(&k.clone().trimmed()))
            .transpose()?;
        let custom_config = req
            .custom_config
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO llm_config_profiles
               (name, provider, api_url, model, api_key, temperature, max_tokens,
                timeout_seconds, system_prompt, custom_config)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(name) DO UPDATE SET
                   provider = excluded.provider,
                   api_url = excluded.api_url,
                   model = excluded.model,
                   api_key = excluded.api_key,
                   temperature = excluded.temperature,
                   max_tokens = excluded.max_tokens,
                   timeout_seconds = excluded.timeout_seconds,
                   system_prompt = excluded.system_prompt,
                   custom_config = excluded.custom_config,
                   updated_at = datetime('now')"#,
        )
        .bind(name)
        .bind(provider.as_str())
        .bind(req.api_url.trim())
        .bind(req.model.trim())
        .bind(&api_key_json)
        .bind(req.temperature)
        .bind(req.max_tokens)
        .bind(req.timeout_seconds)
        .bind(&req.system_prompt)
        .bind(&custom_config)
        .execute(&self.pool)
        .await?;

        tracing::info!("Saved LLM profile '{}' (provider {})", name, provider.as_str());
        Ok(true)
    }

    /// Delete a profile; clears the active-config key when it pointed here.
    pub async fn delete_config(&self, name: &str) -> Result<bool, LLMError> {
        let result = sqlx::query("DELETE FROM llm_config_profiles WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if self.get_active_config_name().await?.as_deref() == Some(name) {
            self.clear_active_config_name().await?;
            tracing::info!("Deleted profile '{}' was active; active config cleared", name);
        }

        Ok(true)
    }

    pub async fn get_active_config_name(&self) -> Result<Option<String>, LLMError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?")
                .bind(ACTIVE_CONFIG_KEY)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    /// Activate a profile by name (or deactivate with None). Unknown names
    /// are rejected and leave the current state untouched.
    pub async fn set_active_config_name(&self, name: Option<&str>) -> Result<bool, LLMError> {
        match name {
            None => {
                self.clear_active_config_name().await?;
                Ok(true)
            },
            Some(name) => {
                let exists: Option<i64> =
                    sqlx::query_scalar("SELECT id FROM llm_config_profiles WHERE name = ?")
                        .bind(name)
                        .fetch_optional(&self.pool)
                        .await?;

                if exists.is_none() {
                    tracing::warn!("配置 '{}' 不存在，无法设为活动配置", name);
                    return Ok(false);
                }

                sqlx::query(
                    r#"INSERT INTO app_settings (key, value) VALUES (?, ?)
                       ON CONFLICT(key) DO UPDATE SET value = excluded.value"#,
                )
                .bind(ACTIVE_CONFIG_KEY)
                .bind(name)
                .execute(&self.pool)
                .await?;

                tracing::info!("Active LLM profile set to '{}'", name);
                Ok(true)
            },
        }
    }

    /// Details of the active profile. A dangling active name (profile since
    /// deleted) self-heals by clearing the setting.
    pub async fn get_active_config(&self) -> Result<Option<LlmProfile>, LLMError> {
        let Some(name) = self.get_active_config_name().await? else {
            return Ok(None);
        };

        match self.get_config(&name).await? {
            Some(profile) => Ok(Some(profile)),
            None => {
                tracing::warn!(
                    "Active config '{}' no longer exists; clearing active setting",
                    name
                );
                self.clear_active_config_name().await?;
                Ok(None)
            },
        }
    }

    /// Seed a single default google profile when no profile exists yet.
    pub async fn seed_default_if_empty(&self) -> Result<(), LLMError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM llm_config_profiles")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        let default = UpsertProfileRequest {
            provider: Some(Provider::Google),
            api_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-1.5-flash-latest".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 2048,
            timeout_seconds: 60,
            system_prompt: None,
            custom_config: None,
        };
        self.add_or_update_config("Gemini", &default).await?;
        self.set_active_config_name(Some("Gemini")).await?;
        tracing::info!("Seeded default Gemini profile");
        Ok(())
    }

    async fn clear_active_config_name(&self) -> Result<(), LLMError> {
        sqlx::query("DELETE FROM app_settings WHERE key = ?")
            .bind(ACTIVE_CONFIG_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn profile_from_row(&self, row: ProfileRow) -> LlmProfile {
        let provider = Provider::parse_provider(&row.provider)
            .unwrap_or_else(|| Provider::infer(&row.name, &row.api_url));

        let stored_key = row.api_key.as_deref().and_then(parse_stored_key);
        let (api_key, api_base) =
            resolve_api_key(provider, &row.name, stored_key);

        tracing::debug!(
            "Loaded profile '{}' (provider {}), key {}",
            row.name,
            provider.as_str(),
            mask_api_key(api_key.as_ref().and_then(|k| k.bearer_token()))
        );

        let custom_config = row.custom_config.as_deref().and_then(|raw| {
            serde_json::from_str(raw)
                .map_err(|e| {
                    tracing::warn!("Unparsable custom_config for profile '{}': {}", row.name, e);
                    e
                })
                .ok()
        });

        LlmProfile {
            name: row.name,
            provider,
            api_url: row.api_url.trim().to_string(),
            model: row.model.trim().to_string(),
            api_key,
            api_base,
            temperature: row.temperature,
            max_tokens: row.max_tokens,
            timeout_seconds: row.timeout_seconds,
            system_prompt: row.system_prompt,
            custom_config,
        }
    }
}

/// Stored keys are JSON (string, list, or ak/sk object); plain text from
/// older deployments is treated as a single key.
fn parse_stored_key(raw: &str) -> Option<ApiKey> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<ApiKey>(raw) {
        Ok(key) => Some(key.trimmed()),
        Err(_) => Some(ApiKey::Single(raw.to_string())),
    }
}

/// Normalized environment variable name for a profile:
/// `<PREFIX>_<SUFFIX>_<NORMALIZED_NAME>`.
fn env_var_name(provider: Provider, profile_name: &str, suffix: &str) -> String {
    let normalized = profile_name
        .to_uppercase()
        .replace([' ', '-'], "_");

    let mut prefix = provider.env_prefix();
    // the profile name wins over the stored provider when it names a family
    if normalized.contains("GEMINI") || normalized.contains("GOOGLE") {
        prefix = "GEMINI";
    } else if normalized.contains("VOLC") || profile_name.contains("火山") {
        prefix = "VOLC";
    } else if normalized.contains("OPENAI") {
        prefix = "OPENAI";
    } else if normalized.contains("AZURE") {
        prefix = "AZURE";
    }

    format!("{}_{}_{}", prefix, suffix, normalized)
}

/// Provider-aware key resolution: environment first, stored value fallback.
/// Returns the key plus an optional api_base override (azure).
fn resolve_api_key(
    provider: Provider,
    profile_name: &str,
    stored: Option<ApiKey>,
) -> (Option<ApiKey>, Option<String>) {
    let env = |suffix: &str| {
        std::env::var(env_var_name(provider, profile_name, suffix))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match provider {
        Provider::VolcengineArk => {
            let access = env("ACCESS_KEY");
            let secret = env("SECRET_KEY");
            match (access, secret) {
                (Some(access_key), Some(secret_key)) => {
                    (Some(ApiKey::AkSk { access_key, secret_key }), None)
                },
                _ => (stored, None),
            }
        },
        Provider::Google => {
            // google keys come from the backing store; legacy lists collapse
            // to their first element
            let key = match stored {
                Some(ApiKey::Multi(keys)) => keys
                    .into_iter()
                    .next()
                    .map(|k| ApiKey::Single(k.trim().to_string())),
                other => other,
            };
            (key, None)
        },
        Provider::Azure => {
            let key = env("API_KEY").map(ApiKey::Single).or(stored);
            let base = env("API_BASE");
            (key, base)
        },
        _ => match env("API_KEY") {
            Some(value) => (Some(ApiKey::Single(value)), None),
            None => (stored, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_follow_the_naming_scheme() {
        assert_eq!(
            env_var_name(Provider::Google, "My Gemini", "API_KEY"),
            "GEMINI_API_KEY_MY_GEMINI"
        );
        assert_eq!(
            env_var_name(Provider::VolcengineArk, "Volcano-Prod", "ACCESS_KEY"),
            "VOLC_ACCESS_KEY_VOLCANO_PROD"
        );
        assert_eq!(env_var_name(Provider::Generic, "deepseek", "API_KEY"), "LLM_API_KEY_DEEPSEEK");
    }

    #[test]
    fn stored_keys_parse_all_three_shapes() {
        assert_eq!(
            parse_stored_key("\"sk-abc\""),
            Some(ApiKey::Single("sk-abc".to_string()))
        );
        assert_eq!(
            parse_stored_key("[\"k1\", \"k2\"]"),
            Some(ApiKey::Multi(vec!["k1".to_string(), "k2".to_string()]))
        );
        assert_eq!(
            parse_stored_key("{\"access_key\": \"ak\", \"secret_key\": \"sk\"}"),
            Some(ApiKey::AkSk { access_key: "ak".to_string(), secret_key: "sk".to_string() })
        );
        // legacy plain text
        assert_eq!(
            parse_stored_key("  raw-key  "),
            Some(ApiKey::Single("raw-key".to_string()))
        );
    }

    #[test]
    fn masking_keeps_only_the_tail() {
        assert_eq!(mask_api_key(Some("sk-1234567890")), "***7890");
        assert_eq!(mask_api_key(Some("short")), "***");
        assert_eq!(mask_api_key(None), "<Not Set>");
    }
}
