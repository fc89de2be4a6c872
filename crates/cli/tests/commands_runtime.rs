use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use hostdesk_cli::commands::{config, migrate, notifications, queue, requests, seed, watch};
use hostdesk_core::{NewGuestRequest, RequestStatus, StatusFilter};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_in_memory_database() {
    with_env(&[("HOSTDESK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn invalid_config_is_reported_with_config_exit_code() {
    with_env(
        &[
            ("HOSTDESK_DATABASE_URL", "sqlite::memory:"),
            ("HOSTDESK_DESK_ALERT_INTERVAL_MS", "5"),
        ],
        || {
            let result = queue::run("emp1", StatusFilter::All, String::new());
            assert_eq!(result.exit_code, 2, "expected config validation failure code");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "queue");
            assert_eq!(payload["status"], "error");
            assert_eq!(payload["error_class"], "config_validation");
        },
    );
}

#[test]
fn config_attributes_env_values_and_redacts_tokens() {
    with_env(
        &[
            ("HOSTDESK_DATABASE_URL", "sqlite::memory:"),
            ("HOSTDESK_NOTIFICATIONS_WEBHOOK_URL", "https://hooks.example.test/desk"),
            ("HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN", "hook-0123456789abcd"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            assert!(!result.output.contains("hook-0123456789abcd"), "token leaked");

            let payload = parse_payload(&result.output);
            let entries = payload["data"].as_array().expect("config entries");
            let url = entries
                .iter()
                .find(|entry| entry["key"] == "database.url")
                .expect("database.url entry");
            assert_eq!(url["value"], "sqlite::memory:");
            assert_eq!(url["source"], "env (HOSTDESK_DATABASE_URL)");

            let webhook = entries
                .iter()
                .find(|entry| entry["key"] == "notifications.webhook_url")
                .expect("webhook url entry");
            assert_eq!(webhook["value"], "https://hooks.example.test/desk");
        },
    );
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|| {
        let first = seed::run(false);
        assert_eq!(first.exit_code, 0, "expected first seed success: {}", first.output);
        let first_inserted = inserted_total(&parse_payload(&first.output));
        assert!(first_inserted > 0);

        let second = seed::run(false);
        assert_eq!(second.exit_code, 0, "expected second seed success");
        assert_eq!(inserted_total(&parse_payload(&second.output)), 0);
    });
}

#[test]
fn approve_cascades_and_shrinks_the_employee_queue() {
    with_database(|| {
        assert_eq!(seed::run(false).exit_code, 0);

        let before = parse_payload(&queue::run("emp1", StatusFilter::All, String::new()).output);
        assert_eq!(before["data"]["pending"], 2);

        let approved = requests::approve("R1".to_string(), "emp1");
        assert_eq!(approved.exit_code, 0, "approve failed: {}", approved.output);
        let payload = parse_payload(&approved.output);
        assert_eq!(payload["data"]["outcome"]["outcome"], "applied");
        assert_eq!(payload["data"]["outcome"]["request"]["status"], "in-progress");
        assert_eq!(payload["data"]["cascade"]["kind"], "updated");
        assert_eq!(payload["data"]["cascade"]["status"], "preparing");

        let after = parse_payload(&queue::run("emp1", StatusFilter::All, String::new()).output);
        assert_eq!(after["data"]["pending"], 1);

        let repeated = parse_payload(&requests::approve("R1".to_string(), "emp1").output);
        assert_eq!(repeated["data"]["outcome"]["outcome"], "unchanged");

        let inbox = parse_payload(&notifications::run(None).output);
        assert_eq!(inbox["data"]["unread"], 2, "N1 plus the new approval");
    });
}

#[test]
fn unknown_request_maps_to_not_found_exit_code() {
    with_database(|| {
        let result = requests::reject("R404".to_string(), "emp1");
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "not_found");
    });
}

#[test]
fn invalid_create_is_rejected_before_any_write() {
    with_database(|| {
        let input = NewGuestRequest {
            room: " ".to_string(),
            guest: "Layla".to_string(),
            request_type: "coffee".to_string(),
            ..NewGuestRequest::default()
        };
        let result = requests::create(input, "frontdesk");
        assert_eq!(result.exit_code, 6);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");

        let listed = parse_payload(&requests::list(StatusFilter::All, String::new()).output);
        assert_eq!(listed["data"]["stats"]["total"], 0);
    });
}

#[test]
fn manager_list_filters_by_exact_status_and_search() {
    with_database(|| {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = requests::list(
            StatusFilter::Only(RequestStatus::AwaitingEmployeeApproval),
            "310".to_string(),
        );
        let payload = parse_payload(&result.output);
        let ids: Vec<&str> = payload["data"]["requests"]
            .as_array()
            .expect("requests array")
            .iter()
            .filter_map(|request| request["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["R2"]);
        assert_eq!(payload["data"]["stats"]["total"], 7);
    });
}

#[test]
fn delete_requires_confirmation() {
    with_database(|| {
        assert_eq!(seed::run(false).exit_code, 0);

        let refused = requests::delete("R4".to_string(), false, "manager");
        assert_eq!(refused.exit_code, 6);
        assert_eq!(parse_payload(&refused.output)["error_class"], "confirmation_required");

        let deleted = requests::delete("R4".to_string(), true, "manager");
        assert_eq!(deleted.exit_code, 0, "delete failed: {}", deleted.output);

        let again = requests::delete("R4".to_string(), true, "manager");
        assert_eq!(again.exit_code, 7);
    });
}

#[test]
fn set_status_overrides_terminal_requests() {
    with_database(|| {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = requests::set_status("R5".to_string(), RequestStatus::Pending, "manager");
        assert_eq!(result.exit_code, 0, "set-status failed: {}", result.output);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["outcome"], "applied");
        assert_eq!(payload["data"]["request"]["status"], "pending");
    });
}

#[test]
fn watch_with_zero_events_returns_after_the_first_snapshot() {
    with_database(|| {
        let result = watch::run(Some("emp1".to_string()), Some(0));
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["command"], "watch");
    });
}

fn inserted_total(payload: &Value) -> u64 {
    payload["data"]
        .as_array()
        .map(|collections| {
            collections.iter().filter_map(|collection| collection["inserted"].as_u64()).sum()
        })
        .unwrap_or_default()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_database(test_fn: impl FnOnce()) {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = database_url(&dir.path().join("hostdesk.db"));
    with_env(&[("HOSTDESK_DATABASE_URL", url.as_str())], test_fn);
}

fn database_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "HOSTDESK_DATABASE_URL",
        "HOSTDESK_DATABASE_MAX_CONNECTIONS",
        "HOSTDESK_DATABASE_TIMEOUT_SECS",
        "HOSTDESK_DESK_ALERT_INTERVAL_MS",
        "HOSTDESK_DESK_STORE_RETRY_LIMIT",
        "HOSTDESK_NOTIFICATIONS_ENABLED",
        "HOSTDESK_NOTIFICATIONS_CHANNEL",
        "HOSTDESK_NOTIFICATIONS_WEBHOOK_URL",
        "HOSTDESK_NOTIFICATIONS_WEBHOOK_TOKEN",
        "HOSTDESK_LOGGING_LEVEL",
        "HOSTDESK_LOGGING_FORMAT",
        "HOSTDESK_LOG_LEVEL",
        "HOSTDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
