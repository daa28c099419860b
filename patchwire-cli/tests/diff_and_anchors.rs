use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

use patchwire_core::{Event, PatchOp};

fn patchwire_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("patchwire"));
    cmd.env("NO_COLOR", "1");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn text_change_prints_one_set_text() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<div>Hello</div>");
    let new = write(dir.path(), "new.html", "<div>World</div>");

    patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg("--verify")
        .assert()
        .success()
        .stdout(contains("set-text").and(contains("\"World\"")))
        .stdout(contains("verified: 1 op(s)"));
}

#[test]
fn json_output_is_a_patch_event() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<ul><li>A</li></ul>");
    let new = write(dir.path(), "new.html", "<ul><li>A</li><li>B</li></ul>");

    let output = patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg("--json")
        .output()
        .expect("run");
    assert!(output.status.success());
    let event: Event = serde_json::from_slice(&output.stdout).expect("event json");
    match event {
        Event::Patch { ops } => {
            assert!(matches!(&ops[..], [PatchOp::InsertNode { index: 1, .. }]), "got: {ops:?}");
        }
        other => panic!("expected patch event, got {other:?}"),
    }
}

#[test]
fn identical_files_report_no_differences() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<p>same</p>");
    let new = write(dir.path(), "new.html", "<p>same</p>\n");

    patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .success()
        .stdout(contains("No differences."));
}

#[test]
fn root_tag_change_reports_fallback() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<div>X</div>");
    let new = write(dir.path(), "new.html", "<span>X</span>");

    patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .success()
        .stdout(contains("fallback:").and(contains("<div> became <span>")));
}

#[test]
fn malformed_markup_fails_with_context() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<div><span></div>");
    let new = write(dir.path(), "new.html", "<div></div>");

    patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .failure()
        .stderr(contains("parse").and(contains("old.html")));
}

#[test]
fn anchors_prints_data_anchor_attributes() {
    let dir = TempDir::new().expect("tempdir");
    let file = write(dir.path(), "page.html", "<main><h1>Title</h1></main>");

    patchwire_cmd()
        .arg("anchors")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("<main data-anchor=\"").and(contains("<h1 data-anchor=\"")));
}

#[test]
fn render_prints_template_output() {
    let dir = TempDir::new().expect("tempdir");
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).expect("mkdir");
    write(&templates, "greet.html.tera", "<p>Hi {{ name }}</p>");
    let assigns = write(dir.path(), "assigns.json", r#"{ "name": "Ada" }"#);

    patchwire_cmd()
        .arg("render")
        .arg(&templates)
        .arg("greet.html")
        .arg("--assigns")
        .arg(&assigns)
        .assert()
        .success()
        .stdout(contains("<p>Hi Ada</p>"));
}

#[test]
fn status_without_daemon_reports_not_running() {
    let dir = TempDir::new().expect("tempdir");
    let socket = dir.path().join("missing.sock");

    patchwire_cmd()
        .arg("status")
        .arg("--socket")
        .arg(&socket)
        .assert()
        .success()
        .stdout(contains("\"running\": false"));
}

#[test]
fn verify_on_fallback_says_it_does_not_apply() {
    let dir = TempDir::new().expect("tempdir");
    let old = write(dir.path(), "old.html", "<div>X</div>");
    let new = write(dir.path(), "new.html", "<span>X</span>");

    patchwire_cmd()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg("--verify")
        .assert()
        .success()
        .stdout(contains("fallback:"))
        .stderr(contains("verify: not applicable"));
}
