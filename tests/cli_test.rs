//! CLI integration tests for the protoprune binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("protoprune"))
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const SERVICE: &str = r#"syntax = "proto3";

package shop;

service OrderService {
  rpc ListOrders(ListOrdersRequest) returns (ListOrdersResponse);
  // @HasAnyRole(admin)
  rpc CreateOrder(CreateOrderRequest) returns (CreateOrderResponse);
}

message ListOrdersRequest {
}

message ListOrdersResponse {
}

message CreateOrderRequest {
}

message CreateOrderResponse {
}
"#;

#[test]
fn missing_input_directory_exits_1() {
    let out = TempDir::new().unwrap();
    cmd()
        .args(["--input", "/nonexistent/path/to/protos"])
        .args(["--output", out.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn same_input_and_output_exits_1() {
    let dir = TempDir::new().unwrap();
    cmd()
        .args(["--input", dir.path().to_str().unwrap()])
        .args(["--output", dir.path().to_str().unwrap()])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("must be different"));
}

#[test]
fn missing_required_flags_exit_1() {
    cmd()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--input"));
}

#[test]
fn zero_proto_files_warns_and_exits_0() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .assert()
        .success()
        .stderr(predicate::str::contains("no .proto files"));
}

#[test]
fn pass_through_writes_output_files() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .assert()
        .success();

    assert!(output.path().join("service.proto").exists());
}

#[test]
fn invalid_yaml_config_exits_2() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let cfg_dir = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);
    let config = write(&cfg_dir, "bad.yaml", "include: [not closed");

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn mutually_exclusive_annotation_rules_exit_2() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let cfg_dir = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);
    let config = write(
        &cfg_dir,
        "filter.yaml",
        "annotations:\n  include: [Public]\n  exclude: [Internal]\n",
    );

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("mutually exclusive"));
}

#[test]
fn glob_conflict_exits_2() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let cfg_dir = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);
    let config = write(
        &cfg_dir,
        "filter.yaml",
        "include:\n  - \"shop.OrderService\"\nexclude:\n  - \"*.OrderService\"\n",
    );

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("conflicting rules"));
}

#[test]
fn annotation_filtering_removes_tagged_method() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let cfg_dir = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);
    let config = write(&cfg_dir, "filter.yaml", "annotations:\n  - \"HasAnyRole\"\n");

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .args(["--verbose"])
        .assert()
        .success()
        .stderr(predicate::str::contains("removed by annotation"));

    let out = fs::read_to_string(output.path().join("service.proto")).unwrap();
    assert!(out.contains("rpc ListOrders"));
    assert!(!out.contains("rpc CreateOrder"));
    assert!(!out.contains("CreateOrderRequest"));
}

#[test]
fn strict_substitutions_report_locations_and_exit_2() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let cfg_dir = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);
    let config = write(&cfg_dir, "filter.yaml", "strict_substitutions: true\n");

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains(
            "unsubstituted annotations found: HasAnyRole",
        ))
        .stderr(predicate::str::contains("service.proto:7: @HasAnyRole(admin)"));

    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[test]
fn verbose_prints_processing_summary() {
    let input = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write(&input, "service.proto", SERVICE);

    cmd()
        .args(["--input", input.path().to_str().unwrap()])
        .args(["--output", output.path().to_str().unwrap()])
        .args(["--verbose"])
        .assert()
        .success()
        .stderr(predicate::str::contains("processed"))
        .stderr(predicate::str::contains("wrote"));
}
