//! Shared test utilities for integration tests
//!
//! Provides fixture creation and a preconfigured `frag` command
//! pointed at a private store inside the fixture.

#![allow(dead_code)]

use std::process::{Command, Stdio};

use assert_cmd::prelude::*;
use assert_fs::prelude::*;

/// Document used by most CLI tests: a call snippet on line 5
pub const CALL_DOC: &str = "def f(x):\n    x + 1\nx = 0\n\nf(x)\n";

/// True when a `python3` interpreter can be spawned
pub fn python_available() -> bool
{
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Temp dir holding `demo.py` with `CALL_DOC`
pub fn make_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    tmp.child("demo.py")
        .write_str(CALL_DOC)
        .expect("write demo.py");

    tmp
}

/// `frag` running inside `tmp` with its store at `tmp/store.json`
/// and no color, so output is stable.
pub fn frag(tmp: &assert_fs::TempDir) -> Command
{
    let mut cmd = Command::cargo_bin("frag").expect("bin");
    cmd.current_dir(tmp.path())
        .env_remove("RUST_LOG")
        .arg("--no-color")
        .arg("--store")
        .arg(tmp.path().join("store.json"));
    cmd
}
