//
// Copyright (c) 2024 Hemi Labs, Inc.
//
// This file is part of the posixutils-rs project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

use similar_asserts::assert_eq;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_preprocess"))
        .args(args)
        .output()
        .expect("failed to spawn preprocess binary")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn writes_to_stdout_by_default() {
    let input = fixture("simple.py");
    let output = run(&["-D", "FOO=1", input.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "kept\n");
}

#[test]
fn repeated_defines_accumulate() {
    let input = fixture("elif.py");
    let output = run(&["-D", "A=0", "-D", "B=1", input.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "b\n");
}

#[test]
fn substitute_flag() {
    let input = fixture("subst.py");
    let output = run(&["-s", input.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "value is 5\n");
}

#[test]
fn keep_lines_flag() {
    let input = fixture("keep.py");
    let output = run(&["-k", "-D", "FLAG=1", input.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "\none\n\n\n\nthree\n");
}

#[test]
fn include_search_path_flag() {
    let input = fixture("include_var.py");
    let inc = fixture("inc");
    let output = run(&[
        "-D",
        "HEADER=shared.py",
        "-I",
        inc.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(stdout_of(&output), "shared content\ndone\n");
}

#[test]
fn errors_exit_nonzero_with_position() {
    let input = fixture("undefined.py");
    let output = run(&[input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = stderr_of(&output);
    assert!(stderr.contains("preprocess: error:"), "{}", stderr);
    assert!(stderr.contains("undefined.py:1"), "{}", stderr);
    assert!(stderr.contains("name 'BAR' is not defined"), "{}", stderr);
}

#[test]
fn bad_definition_is_rejected() {
    let input = fixture("simple.py");
    let output = run(&["-D", "=1", input.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("invalid definition symbol"));
}

#[test]
fn refuses_to_overwrite_output_without_force() {
    let out_path = std::env::temp_dir().join(format!(
        "preprocess-overwrite-{}.txt",
        std::process::id()
    ));
    fs::write(&out_path, "precious\n").unwrap();

    let input = fixture("simple.py");
    let output = run(&[
        "-D",
        "FOO=1",
        "-o",
        out_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("already exists"));
    assert_eq!(fs::read_to_string(&out_path).unwrap(), "precious\n");

    // With --force the file is replaced.
    let output = run(&[
        "-D",
        "FOO=1",
        "-f",
        "-o",
        out_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(fs::read_to_string(&out_path).unwrap(), "kept\n");

    fs::remove_file(&out_path).ok();
}

#[test]
fn force_replaces_a_read_only_output() {
    let out_path = std::env::temp_dir().join(format!(
        "preprocess-readonly-{}.txt",
        std::process::id()
    ));
    fs::write(&out_path, "stale\n").unwrap();
    let mut perms = fs::metadata(&out_path).unwrap().permissions();
    perms.set_readonly(true);
    fs::set_permissions(&out_path, perms).unwrap();

    let input = fixture("simple.py");
    let output = run(&[
        "-D",
        "FOO=1",
        "-f",
        "-o",
        out_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(fs::read_to_string(&out_path).unwrap(), "kept\n");

    fs::remove_file(&out_path).ok();
}

#[test]
fn writes_output_file() {
    let out_path = std::env::temp_dir().join(format!(
        "preprocess-output-{}.txt",
        std::process::id()
    ));
    fs::remove_file(&out_path).ok();

    let input = fixture("ifdef.html");
    let output = run(&[
        "-D",
        "FEATURE",
        "-o",
        out_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert!(stdout_of(&output).is_empty());
    assert_eq!(
        fs::read_to_string(&out_path).unwrap(),
        "<html>\n<p>feature</p>\n</html>\n"
    );

    fs::remove_file(&out_path).ok();
}

#[test]
fn content_types_config_flag() {
    let config_path = std::env::temp_dir().join(format!(
        "preprocess-types-{}.config",
        std::process::id()
    ));
    // Remap .py to HTML; the hash directives then pass through verbatim.
    fs::write(&config_path, "HTML .py\n").unwrap();

    let input = fixture("simple.py");
    let output = run(&[
        "-D",
        "FOO=1",
        "-c",
        config_path.to_str().unwrap(),
        input.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    assert_eq!(
        stdout_of(&output),
        "# #if FOO\nkept\n# #else\ndropped\n# #endif\n"
    );

    fs::remove_file(&config_path).ok();
}
