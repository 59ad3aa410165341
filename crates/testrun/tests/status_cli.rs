use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn status_prints_backend_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/system/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Compliant",
            "device": {"mac_addr": "00:1e:42:35:73:c4", "manufacturer": "Teltonika", "model": "TRB140"},
            "started": "2023-07-18 12:00:00",
            "finished": "2023-07-18 12:01:40",
            "tests": {"total": 1, "results": [
                {"name": "dns.network.hostname_resolution", "description": "ok", "result": "Compliant"}
            ]}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args(["--api-url", &server.uri(), "status"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Compliant\tTeltonika TRB140\t1/1 tests"))
        .stdout(predicate::str::contains("100s"));
}

#[tokio::test]
async fn devices_lists_roster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"mac_addr": "00:1e:42:35:73:c4", "manufacturer": "Teltonika", "model": "TRB140",
             "firmware": "1.2.3", "test_modules": {"dns": {"enabled": true}}}
        ])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args(["--api-url", &server.uri(), "devices"]);
    cmd.assert().success().stdout(predicate::str::contains(
        "00:1e:42:35:73:c4\tTeltonika TRB140\t1.2.3\tdns",
    ));
}

#[tokio::test]
async fn stop_when_idle_fails_with_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/system/stop"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            json!({"error": "Testrun is not currently running"}),
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args(["--api-url", &server.uri(), "stop"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Testrun is not currently running"));
}

#[tokio::test]
async fn interfaces_checks_configured_roles_against_host() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/system/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enp0s3": "08:00:27:aa:bb:cc",
            "enx00e04c": "00:e0:4c:11:22:33"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/system/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "network": {"device_intf": "enx00e04c", "internet_intf": "wlan0"}
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args(["--api-url", &server.uri(), "interfaces"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("enp0s3\t08:00:27:aa:bb:cc"))
        .stdout(predicate::str::contains("device\tenx00e04c\tok"))
        .stdout(predicate::str::contains("internet\twlan0\tinvalid"));
}

#[tokio::test]
async fn device_add_registers_with_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/device"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "mac_addr": "00:1e:42:35:73:c4"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args([
        "--api-url",
        &server.uri(),
        "device",
        "add",
        "--mac",
        "00:1e:42:35:73:c4",
        "--manufacturer",
        "Google",
        "--model",
        "First",
        "--module",
        "dns",
    ]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("added Google First"));
}

#[tokio::test]
async fn device_delete_of_unknown_mac_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("trs");
    cmd.env("TRS_DIR", dir.path());
    cmd.args(["--api-url", &server.uri(), "device", "delete", "--mac", "aa:bb"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("no device with mac address aa:bb"));
}
