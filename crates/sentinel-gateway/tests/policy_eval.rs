#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chrono::NaiveTime;
use serde_json::{json, Map, Value};

use sentinel_core::{DefaultEffect, Effect, Glob};
use sentinel_gateway::policy::{
    default_policy, load_or_default, FilePolicySource, PolicyConfig, PolicyEvaluator, PolicyRule,
    PolicySource, RuleConditions, StaticPolicySource,
};

fn ctx(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn noon() -> NaiveTime {
    at(12, 0)
}

#[test]
fn protected_path_denied_elsewhere_allowed() {
    let cfg = PolicyConfig::parse_json(
        r#"{"defaultEffect":"allow","rules":[
            {"id":"etc","action":"delete_file","effect":"deny","conditions":{"pathPattern":"/etc/*"}}
        ]}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();

    let v = ev.evaluate_at("delete_file", &ctx(json!({"path": "/etc/passwd"})), noon());
    assert_eq!(v.effect, Effect::Deny);
    assert_eq!(v.matched_rule_id.as_deref(), Some("etc"));
    assert_eq!(v.reason, "matched rule: etc");

    let v = ev.evaluate_at("delete_file", &ctx(json!({"path": "/tmp/x"})), noon());
    assert_eq!(v.effect, Effect::Allow);
    assert!(v.matched_rule_id.is_none());
    assert_eq!(v.reason, "no rule matched, using default policy");
}

#[test]
fn first_match_wins() {
    let cfg = PolicyConfig::new(
        DefaultEffect::Allow,
        vec![
            PolicyRule::new("first", Glob::new("tool_*").unwrap(), Effect::Warn),
            PolicyRule::new("second", Glob::new("tool_run").unwrap(), Effect::Deny),
        ],
    );
    let ev = PolicyEvaluator::new(cfg).unwrap();
    let v = ev.evaluate_at("tool_run", &Map::new(), noon());
    assert_eq!(v.effect, Effect::Warn);
    assert_eq!(v.matched_rule_id.as_deref(), Some("first"));
}

#[test]
fn default_deny_applies_when_nothing_matches() {
    let cfg = PolicyConfig::parse_json(r#"{"defaultEffect":"deny","rules":[]}"#).unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();
    assert_eq!(ev.evaluate_at("anything", &Map::new(), noon()).effect, Effect::Deny);
}

#[test]
fn missing_context_field_fails_condition() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[{"id":"r","action":"*","effect":"deny","conditions":{"pathPattern":"*"}}]}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();
    assert_eq!(ev.evaluate_at("read", &Map::new(), noon()).effect, Effect::Allow);
    // wrong JSON type counts as absent
    let v = ev.evaluate_at("read", &ctx(json!({"path": 42})), noon());
    assert_eq!(v.effect, Effect::Allow);
}

#[test]
fn max_cost_fires_only_strictly_above() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[{"id":"big","action":"llm_call","effect":"deny","conditions":{"maxCost":1.0},"reason":"too expensive"}]}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();

    let at_limit = ev.evaluate_at("llm_call", &ctx(json!({"cost": 1.0})), noon());
    assert_eq!(at_limit.effect, Effect::Allow);

    let above = ev.evaluate_at("llm_call", &ctx(json!({"cost": 1.5})), noon());
    assert_eq!(above.effect, Effect::Deny);
    assert_eq!(above.reason, "too expensive");

    let no_cost = ev.evaluate_at("llm_call", &Map::new(), noon());
    assert_eq!(no_cost.effect, Effect::Allow);
}

#[test]
fn user_pattern_condition() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[{"id":"bots","action":"*","effect":"deny","conditions":{"userPattern":"bot-*"}}]}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();
    let denied = ev.evaluate_at("x", &ctx(json!({"userId": "bot-7"})), noon());
    assert_eq!(denied.effect, Effect::Deny);
    let allowed = ev.evaluate_at("x", &ctx(json!({"userId": "alice"})), noon());
    assert_eq!(allowed.effect, Effect::Allow);
}

#[test]
fn time_windows_are_inclusive_and_wrap_midnight() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[
            {"id":"office","action":"deploy","effect":"allow","conditions":{"timeWindow":{"start":"09:00","end":"17:00"}}},
            {"id":"night","action":"backup","effect":"warn","conditions":{"timeWindow":{"start":"22:00","end":"06:00"}}}
        ],"defaultEffect":"deny"}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();
    let empty = Map::new();

    assert_eq!(ev.evaluate_at("deploy", &empty, at(9, 0)).effect, Effect::Allow);
    assert_eq!(ev.evaluate_at("deploy", &empty, at(17, 0)).effect, Effect::Allow);
    // seconds inside the end minute still count
    let late = NaiveTime::from_hms_opt(17, 0, 45).unwrap();
    assert_eq!(ev.evaluate_at("deploy", &empty, late).effect, Effect::Allow);
    assert_eq!(ev.evaluate_at("deploy", &empty, at(17, 1)).effect, Effect::Deny);
    assert_eq!(ev.evaluate_at("deploy", &empty, at(8, 59)).effect, Effect::Deny);

    assert_eq!(ev.evaluate_at("backup", &empty, at(23, 30)).effect, Effect::Warn);
    assert_eq!(ev.evaluate_at("backup", &empty, at(3, 0)).effect, Effect::Warn);
    assert_eq!(ev.evaluate_at("backup", &empty, at(6, 0)).effect, Effect::Warn);
    assert_eq!(ev.evaluate_at("backup", &empty, at(12, 0)).effect, Effect::Deny);
}

#[test]
fn glob_is_anchored_and_literal() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[{"id":"dot","action":"file.read","effect":"deny"}]}"#,
    )
    .unwrap();
    let ev = PolicyEvaluator::new(cfg).unwrap();
    assert_eq!(ev.evaluate_at("file.read", &Map::new(), noon()).effect, Effect::Deny);
    assert_eq!(ev.evaluate_at("fileXread", &Map::new(), noon()).effect, Effect::Allow);
    assert_eq!(ev.evaluate_at("file.read.all", &Map::new(), noon()).effect, Effect::Allow);
}

#[test]
fn action_pattern_alias_accepted() {
    let cfg = PolicyConfig::parse_json(
        r#"{"rules":[{"id":"a","actionPattern":"net_*","effect":"warn"}]}"#,
    )
    .unwrap();
    assert_eq!(cfg.rules[0].action.as_str(), "net_*");
}

#[test]
fn invalid_documents_rejected() {
    for bad in [
        r#"{"rules":[{"id":"a","action":"x","effect":"deny"},{"id":"a","action":"y","effect":"allow"}]}"#,
        r#"{"rules":[{"id":"a","action":"","effect":"deny"}]}"#,
        r#"{"rules":[{"id":"a","action":"x","effect":"block"}]}"#,
        r#"{"rules":[{"id":"a","action":"x","effect":"deny","conditions":{"timeWindow":{"start":"9am","end":"17:00"}}}]}"#,
        r#"{"defaultEffect":"warn","rules":[]}"#,
        r#"{"rules":[],"extra":true}"#,
    ] {
        let err = PolicyConfig::parse_json(bad).expect_err(bad);
        assert_eq!(err.client_code().as_str(), "INVALID_POLICY", "{bad}");
    }
}

#[test]
fn add_remove_and_update_rules() {
    let ev = PolicyEvaluator::new(PolicyConfig::new(DefaultEffect::Allow, vec![])).unwrap();
    assert_eq!(ev.rule_count(), 0);

    let before = ev.snapshot();
    ev.add_rule(PolicyRule::new("r1", Glob::new("rm").unwrap(), Effect::Deny))
        .unwrap();
    assert_eq!(ev.rule_count(), 1);
    // earlier snapshots are never mutated
    assert!(before.rules.is_empty());
    assert_eq!(ev.evaluate_at("rm", &Map::new(), noon()).effect, Effect::Deny);

    let dup = ev.add_rule(PolicyRule::new("r1", Glob::new("ls").unwrap(), Effect::Deny));
    assert!(dup.is_err());
    assert_eq!(ev.rule_count(), 1);

    assert!(ev.remove_rule("r1"));
    assert!(!ev.remove_rule("r1"));
    assert_eq!(ev.evaluate_at("rm", &Map::new(), noon()).effect, Effect::Allow);

    ev.update_policy(PolicyConfig::new(DefaultEffect::Deny, vec![])).unwrap();
    assert_eq!(ev.evaluate_at("rm", &Map::new(), noon()).effect, Effect::Deny);
}

#[test]
fn default_policy_behaviour() {
    let ev = PolicyEvaluator::new(default_policy()).unwrap();
    assert_eq!(ev.rule_count(), 4);

    let v = ev.evaluate_at("delete_file", &ctx(json!({"path": "/etc/hosts"})), noon());
    assert_eq!(v.effect, Effect::Deny);
    assert_eq!(v.matched_rule_id.as_deref(), Some("block_system_files"));

    let v = ev.evaluate_at("delete_file", &ctx(json!({"path": "/sys/kernel"})), noon());
    assert_eq!(v.matched_rule_id.as_deref(), Some("block_root_files"));

    let v = ev.evaluate_at("execute_shell", &Map::new(), noon());
    assert_eq!(v.effect, Effect::Warn);

    let v = ev.evaluate_at("llm_call", &ctx(json!({"cost": 0.5})), noon());
    assert_eq!(v.effect, Effect::Allow);
    assert_eq!(v.matched_rule_id.as_deref(), Some("limit_expensive_llm_calls"));

    let v = ev.evaluate_at("delete_file", &ctx(json!({"path": "/home/me/x"})), noon());
    assert_eq!(v.effect, Effect::Allow);
    assert!(v.matched_rule_id.is_none());
}

#[test]
fn policy_document_roundtrips_through_json() {
    let text = serde_json::to_string(&default_policy()).unwrap();
    let back = PolicyConfig::parse_json(&text).unwrap();
    assert_eq!(back, default_policy());
}

#[tokio::test]
async fn file_source_reads_yaml_and_json() {
    let dir = tempfile::tempdir().unwrap();

    let yaml = dir.path().join("policy.yaml");
    std::fs::write(
        &yaml,
        "defaultEffect: deny\nrules:\n  - id: reads\n    action: \"read_*\"\n    effect: allow\n",
    )
    .unwrap();
    let cfg = FilePolicySource::new(&yaml).load().await.unwrap();
    assert_eq!(cfg.default_effect, DefaultEffect::Deny);
    assert_eq!(cfg.rules[0].id, "reads");

    let json_path = dir.path().join("policy.json");
    std::fs::write(&json_path, r#"{"rules":[{"id":"j","action":"x","effect":"warn"}]}"#).unwrap();
    let cfg = FilePolicySource::new(&json_path).load().await.unwrap();
    assert_eq!(cfg.rules[0].effect, Effect::Warn);
}

#[tokio::test]
async fn broken_source_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, "{ not json").unwrap();

    let cfg = load_or_default(&FilePolicySource::new(&path)).await;
    assert_eq!(cfg, default_policy());

    let missing = load_or_default(&FilePolicySource::new(dir.path().join("absent.json"))).await;
    assert_eq!(missing, default_policy());

    let fixed = PolicyConfig::new(DefaultEffect::Deny, vec![]);
    let loaded = load_or_default(&StaticPolicySource::new(fixed.clone())).await;
    assert_eq!(loaded, fixed);
}
