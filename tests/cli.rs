use assert_cmd::Command;
use predicates::prelude::*;

fn transcribe() -> Command {
    let mut cmd = Command::cargo_bin("transcribe").unwrap();
    cmd.env_remove("OTTER_USERNAME")
        .env_remove("OTTER_PASSWORD")
        .env_remove("TRANSCRIBE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_describes_usage() {
    transcribe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Otter"))
        .stdout(predicate::str::contains("--write-config"))
        .stdout(predicate::str::contains("<FILE>"));
}

#[test]
fn test_missing_file_argument_fails() {
    transcribe()
        .args(["-u", "alice", "-p", "secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<FILE>"));
}

#[test]
fn test_nonexistent_file_fails_before_network() {
    transcribe()
        .args(["-u", "alice", "-p", "secret", "-q"])
        .arg("/definitely/not/here/meeting.mp3")
        .env("OTTER_BASE_URL", "http://127.0.0.1:9")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("File does not exist"));
}

#[test]
fn test_unreachable_service_reports_login_failure() {
    let dir = tempfile::tempdir().unwrap();
    let audio = dir.path().join("memo.wav");
    std::fs::write(&audio, b"RIFF0000WAVE").unwrap();

    transcribe()
        .args(["-u", "alice", "-p", "secret", "-q", "--timeout", "5"])
        .arg(&audio)
        .env("OTTER_BASE_URL", "http://127.0.0.1:9")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Unable to log in"))
        .stderr(predicate::str::contains("Network error"));
}
