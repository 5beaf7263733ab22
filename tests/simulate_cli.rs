//! End-to-end runs of the `tuuli-site` binary against the fixtures.

use std::path::PathBuf;
use std::process::{Command, Output};

fn root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tuuli-site"))
        .args(args)
        .env_remove("RESEND_API_KEY")
        .env_remove("RUST_LOG")
        .current_dir(root())
        .output()
        .expect("failed to run tuuli-site")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn gen_config_prints_every_section() {
    let output = run(&["gen-config"]);
    assert!(output.status.success());
    let text = stdout(&output);
    for section in ["[consent]", "[analytics]", "[reveal]", "[spotlight]", "[slideshow]", "[qr]", "[email]"] {
        assert!(text.contains(section), "missing {section}");
    }
}

#[test]
fn simulate_replays_scenario() {
    let output = run(&[
        "--config",
        "fixtures",
        "simulate",
        "fixtures/pages/home.json",
        "--scenario",
        "fixtures/scenarios/first-visit.toml",
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let text = stdout(&output);
    assert!(text.contains("Steps"));
    assert!(text.contains("005 advance 400ms \u{2192} 1 task"));
    assert!(text.contains("001 reveal (.product-content): 2"));
    assert!(text.contains("Consent: accepted, analytics active"));
    assert!(!text.contains("<!DOCTYPE html>"));
}

#[test]
fn simulate_html_renders_document() {
    let output = run(&["simulate", "fixtures/pages/home.json", "--html"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("<!DOCTYPE html>"));
    assert!(text.contains("id=\"cookie-consent-banner\""));
    assert!(text.contains("qr-trigger-btn"));
}

#[test]
fn simulate_reports_loading_page() {
    let output = run(&["simulate", "fixtures/pages/loading.json"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("is still loading"));
}

#[test]
fn check_walks_fixture_pages() {
    let output = run(&["check"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("aura.json \u{2192} https://tuuli.cz/aura/"));
    assert!(text.contains("projekty.json \u{2192} https://tuuli.cz/projekty/"));
    assert!(text.contains("==> Checked 4 pages"));
}

#[test]
fn simulate_storage_remembers_consent() {
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().to_str().unwrap();

    let first = run(&[
        "simulate",
        "fixtures/pages/home.json",
        "--scenario",
        "fixtures/scenarios/first-visit.toml",
        "--storage",
        dir,
    ]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(stdout(&first).contains("Consent: accepted"));

    let second = run(&["simulate", "fixtures/pages/home.json", "--storage", dir, "--html"]);
    assert!(second.status.success(), "{}", String::from_utf8_lossy(&second.stderr));
    let text = stdout(&second);
    assert!(text.contains("Consent: accepted"));
    assert!(!text.contains("id=\"cookie-consent-banner\""));
}

#[test]
fn simulate_missing_page_fails() {
    let output = run(&["simulate", "fixtures/pages/nope.json"]);
    assert!(!output.status.success());
}

#[test]
fn send_email_without_key_fails() {
    let output = run(&[
        "send-email",
        "--to",
        "klient@example.com",
        "--subject",
        "Poptávka",
        "--markdown",
        "Cargo.toml",
    ]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Failed to send to klient@example.com"));
}

#[test]
fn send_email_needs_a_body() {
    let output = run(&["send-email", "--to", "a@b.cz", "--subject", "x"]);
    assert!(!output.status.success());
}
