//! LLM config manager tests: persistence, activation, key resolution.

use crate::services::llm::{ApiKey, LLMConfigManager, Provider, UpsertProfileRequest};
use crate::tests::common::create_test_db;

fn profile(api_url: &str) -> UpsertProfileRequest {
    UpsertProfileRequest {
        provider: None,
        api_url: api_url.to_string(),
        model: "test-model".to_string(),
        api_key: Some(ApiKey::Single("  sk-stored-key-123456  ".to_string())),
        temperature: 0.7,
        max_tokens: 2048,
        timeout_seconds: 60,
        system_prompt: Some("你是新闻分析助手".to_string()),
        custom_config: None,
    }
}

#[tokio::test]
async fn save_then_load_restores_scalar_fields() {
    let manager = LLMConfigManager::new(create_test_db().await);

    manager
        .add_or_update_config("deepseek-main", &profile("https://api.deepseek.example/v1"))
        .await
        .unwrap();

    let loaded = manager.get_config("deepseek-main").await.unwrap().unwrap();
    assert_eq!(loaded.name, "deepseek-main");
    assert_eq!(loaded.api_url, "https://api.deepseek.example/v1");
    assert_eq!(loaded.model, "test-model");
    assert_eq!(loaded.temperature, 0.7);
    assert_eq!(loaded.max_tokens, 2048);
    assert_eq!(loaded.timeout_seconds, 60);
    assert_eq!(loaded.system_prompt.as_deref(), Some("你是新闻分析助手"));
    // keys are whitespace-trimmed on the return path
    assert_eq!(
        loaded.api_key,
        Some(ApiKey::Single("sk-stored-key-123456".to_string()))
    );
}

#[tokio::test]
async fn names_come_back_sorted() {
    let manager = LLMConfigManager::new(create_test_db().await);
    for name in ["zeta", "alpha", "mid"] {
        manager.add_or_update_config(name, &profile("https://x")).await.unwrap();
    }
    assert_eq!(manager.get_config_names().await.unwrap(), vec!["alpha", "mid", "zeta"]);
}

#[tokio::test]
async fn empty_profile_names_are_rejected() {
    let manager = LLMConfigManager::new(create_test_db().await);
    assert!(manager.add_or_update_config("   ", &profile("https://x")).await.is_err());
}

#[tokio::test]
async fn missing_profile_loads_as_none() {
    let manager = LLMConfigManager::new(create_test_db().await);
    assert!(manager.get_config("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn provider_is_inferred_and_falls_back_to_generic() {
    let manager = LLMConfigManager::new(create_test_db().await);

    manager
        .add_or_update_config("my-gemini", &profile("https://generativelanguage.googleapis.com"))
        .await
        .unwrap();
    assert_eq!(
        manager.get_config("my-gemini").await.unwrap().unwrap().provider,
        Provider::Google
    );

    manager
        .add_or_update_config("internal-llm", &profile("https://llm.corp.example/v1"))
        .await
        .unwrap();
    assert_eq!(
        manager.get_config("internal-llm").await.unwrap().unwrap().provider,
        Provider::Generic
    );
}

#[tokio::test]
async fn activating_an_unknown_profile_is_rejected() {
    let manager = LLMConfigManager::new(create_test_db().await);
    manager.add_or_update_config("a", &profile("https://x")).await.unwrap();
    manager.set_active_config_name(Some("a")).await.unwrap();

    let accepted = manager.set_active_config_name(Some("missing")).await.unwrap();
    assert!(!accepted);
    // active state untouched
    assert_eq!(manager.get_active_config_name().await.unwrap().as_deref(), Some("a"));
}

#[tokio::test]
async fn deleting_the_active_profile_clears_the_active_key() {
    let manager = LLMConfigManager::new(create_test_db().await);
    manager.add_or_update_config("a", &profile("https://x")).await.unwrap();
    manager.set_active_config_name(Some("a")).await.unwrap();

    assert!(manager.delete_config("a").await.unwrap());
    assert!(manager.get_active_config_name().await.unwrap().is_none());
}

#[tokio::test]
async fn dangling_active_name_self_heals() {
    let pool = create_test_db().await;
    let manager = LLMConfigManager::new(pool.clone());
    manager.add_or_update_config("a", &profile("https://x")).await.unwrap();

    // simulate a profile removed behind the manager's back
    sqlx::query("INSERT OR REPLACE INTO app_settings (key, value) VALUES ('active_llm_config', 'ghost')")
        .execute(&pool)
        .await
        .unwrap();

    assert!(manager.get_active_config().await.unwrap().is_none());
    assert!(manager.get_active_config_name().await.unwrap().is_none());
}

#[tokio::test]
async fn env_key_wins_over_stored_key() {
    let manager = LLMConfigManager::new(create_test_db().await);
    manager
        .add_or_update_config("env-probe one", &profile("https://llm.example/v1"))
        .await
        .unwrap();

    // generic provider, name normalized: spaces -> underscores
    unsafe { std::env::set_var("LLM_API_KEY_ENV_PROBE_ONE", " sk-from-env-9999 ") };
    let loaded = manager.get_config("env-probe one").await.unwrap().unwrap();
    unsafe { std::env::remove_var("LLM_API_KEY_ENV_PROBE_ONE") };

    assert_eq!(loaded.api_key, Some(ApiKey::Single("sk-from-env-9999".to_string())));
}

#[tokio::test]
async fn volcengine_pairs_both_env_keys_or_falls_back() {
    let manager = LLMConfigManager::new(create_test_db().await);
    let mut req = profile("https://ark.volces.example/v3");
    req.provider = Some(Provider::VolcengineArk);
    manager.add_or_update_config("volc-prod", &req).await.unwrap();

    // only one half present -> stored key wins
    unsafe { std::env::set_var("VOLC_ACCESS_KEY_VOLC_PROD", "ak-half") };
    let fallback = manager.get_config("volc-prod").await.unwrap().unwrap();
    assert_eq!(
        fallback.api_key,
        Some(ApiKey::Single("sk-stored-key-123456".to_string()))
    );

    unsafe { std::env::set_var("VOLC_SECRET_KEY_VOLC_PROD", "sk-half") };
    let resolved = manager.get_config("volc-prod").await.unwrap().unwrap();
    unsafe {
        std::env::remove_var("VOLC_ACCESS_KEY_VOLC_PROD");
        std::env::remove_var("VOLC_SECRET_KEY_VOLC_PROD");
    }

    assert_eq!(
        resolved.api_key,
        Some(ApiKey::AkSk { access_key: "ak-half".to_string(), secret_key: "sk-half".to_string() })
    );
}

#[tokio::test]
async fn google_legacy_key_lists_collapse_to_first() {
    let manager = LLMConfigManager::new(create_test_db().await);
    let mut req = profile("https://generativelanguage.googleapis.com");
    req.provider = Some(Provider::Google);
    req.api_key = Some(ApiKey::Multi(vec![" first-key-0001 ".to_string(), "second".to_string()]));
    manager.add_or_update_config("legacy-gplain", &req).await.unwrap();

    let loaded = manager.get_config("legacy-gplain").await.unwrap().unwrap();
    assert_eq!(loaded.api_key, Some(ApiKey::Single("first-key-0001".to_string())));
}

#[tokio::test]
async fn activation_becomes_visible_after_reload() {
    use crate::services::llm::{LLMService, OpenAiCompatLLMService};
    use std::sync::Arc;

    let manager = Arc::new(LLMConfigManager::new(create_test_db().await));
    manager.add_or_update_config("a", &profile("https://a.example/v1")).await.unwrap();
    manager.add_or_update_config("b", &profile("https://b.example/v1")).await.unwrap();
    manager.set_active_config_name(Some("a")).await.unwrap();

    let service = OpenAiCompatLLMService::new(Arc::clone(&manager));
    assert!(!service.is_configured());

    service.reload_active_config().await.unwrap();
    assert!(service.is_configured());

    // switching the election requires a reload to take effect
    assert!(manager.set_active_config_name(Some("b")).await.unwrap());
    service.reload_active_config().await.unwrap();
    assert_eq!(
        manager.get_active_config().await.unwrap().unwrap().name,
        "b"
    );

    // clearing the election de-configures the service after reload
    manager.set_active_config_name(None).await.unwrap();
    service.reload_active_config().await.unwrap();
    assert!(!service.is_configured());
}

#[tokio::test]
async fn default_seed_creates_one_google_profile() {
    let manager = LLMConfigManager::new(create_test_db().await);
    manager.seed_default_if_empty().await.unwrap();

    let names = manager.get_config_names().await.unwrap();
    assert_eq!(names.len(), 1);
    let active = manager.get_active_config().await.unwrap().unwrap();
    assert_eq!(active.provider, Provider::Google);

    // a second call must not add more
    manager.seed_default_if_empty().await.unwrap();
    assert_eq!(manager.get_config_names().await.unwrap().len(), 1);
}
