use crate::channels::sms::SmsPlugin;
use crate::channels::webhook::WebhookPlugin;
use crate::plugin::{PluginRegistry, PluginSpec};
use serde_json::json;

fn test_registry() -> PluginRegistry {
    let specs: Vec<PluginSpec> = serde_json::from_value(json!([
        {
            "name": "sms",
            "type": "sms",
            "config": {"gateway_url": "http://127.0.0.1:9999/send", "api_key": "k"}
        },
        {"name": "hooks", "type": "webhook"},
    ]))
    .unwrap();
    PluginRegistry::from_config(&specs).unwrap()
}

#[test]
fn registry_preserves_configuration_order() {
    let registry = test_registry();
    assert_eq!(registry.plugin_names(), vec!["sms", "hooks"]);
}

#[test]
fn registry_rejects_unknown_plugin_type() {
    let specs: Vec<PluginSpec> = serde_json::from_value(json!([
        {"name": "x", "type": "carrier-pigeon"},
    ]))
    .unwrap();
    let err = PluginRegistry::from_config(&specs).unwrap_err();
    assert!(err.to_string().contains("carrier-pigeon"));
}

#[test]
fn medium_resolution_is_first_acceptor() {
    let registry = test_registry();

    let sms = registry.plugin_for_medium("phone").unwrap();
    assert_eq!(sms.name(), "sms");
    let sms = registry.plugin_for_medium("workphone").unwrap();
    assert_eq!(sms.name(), "sms");

    let hook = registry.plugin_for_medium("webhookurl").unwrap();
    assert_eq!(hook.name(), "hooks");

    assert!(registry.plugin_for_medium("email").is_none());
    assert!(registry.plugin_for_medium("pager").is_none());
}

#[test]
fn medium_resolution_is_deterministic() {
    // Same attribute, same registry: always the same plugin.
    let registry = test_registry();
    let first = registry.plugin_for_medium("phone").unwrap().name().to_string();
    for _ in 0..10 {
        assert_eq!(registry.plugin_for_medium("phone").unwrap().name(), first);
    }
}

#[test]
fn sms_plugin_validates_config() {
    assert!(SmsPlugin::from_config("sms", &json!({})).is_err());
    assert!(SmsPlugin::from_config(
        "sms",
        &json!({"gateway_url": "", "api_key": "k"})
    )
    .is_err());
    assert!(SmsPlugin::from_config(
        "sms",
        &json!({"gateway_url": "http://gw/send", "api_key": "k"})
    )
    .is_ok());
}

#[test]
fn webhook_template_substitution() {
    let plugin = WebhookPlugin::from_config(
        "hooks",
        &json!({"body_template": "{\"p\": \"{{probe}}\", \"m\": \"{{message}}\"}"}),
    )
    .unwrap();
    assert_eq!(
        plugin.render_body("db-ping", "probe is down"),
        "{\"p\": \"db-ping\", \"m\": \"probe is down\"}"
    );

    let plain = WebhookPlugin::from_config("hooks", &json!({})).unwrap();
    let body: serde_json::Value = serde_json::from_str(&plain.render_body("p", "m")).unwrap();
    assert_eq!(body["probe"], "p");
    assert_eq!(body["message"], "m");
}

#[test]
fn get_by_name() {
    let registry = test_registry();
    assert!(registry.get("sms").is_some());
    assert!(registry.get("missing").is_none());
    assert!(!registry.is_empty());
}
