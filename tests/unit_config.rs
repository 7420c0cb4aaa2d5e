#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use clap::Parser;
use resource_loadgen::lib_mem::CHUNK_BYTES;
use resource_loadgen::Config;
use std::time::Duration;

#[test]
fn parses_all_flags() {
    let c = Config::try_parse_from([
        "resource-loadgen",
        "--cpu",
        "2",
        "--memory",
        "1",
        "--extra-memory",
        "3",
        "--extra-memory-delay",
        "60",
        "--metrics-bind",
        "127.0.0.1:0",
        "--duration",
        "10",
        "--hash-buffer-mb",
        "4",
    ])
    .expect("parse");
    let t = c.targets();
    assert_eq!(t.cpu_cores, Some(2));
    assert_eq!(t.memory_gigabytes, Some(1));
    assert_eq!(t.extra_memory_gigabytes, Some(3));
    assert_eq!(t.extra_memory_delay_seconds, 60);
    assert_eq!(c.metrics_bind, "127.0.0.1:0");
    assert_eq!(c.duration(), Some(Duration::from_secs(10)));
    assert_eq!(c.hash_buffer_bytes(), 4 * CHUNK_BYTES);
    assert!(c.validate().is_ok());
}

#[test]
fn defaults() {
    let c = Config::try_parse_from(["resource-loadgen", "--cpu", "1"]).expect("parse");
    assert_eq!(c.extra_memory_delay_seconds, 300);
    assert_eq!(c.hash_buffer_megabytes, 32);
    assert_eq!(c.duration(), None);
    assert!(c.validate().is_ok());
}

#[test]
fn rejects_negative_values() {
    assert!(Config::try_parse_from(["resource-loadgen", "--cpu", "-1"]).is_err());
}

#[test]
fn validate_rejects_missing_targets() {
    let c = Config::try_parse_from(["resource-loadgen", "--extra-memory", "1"]).expect("parse");
    assert!(c.validate().is_err());
}

#[test]
fn validate_rejects_zero_hash_buffer() {
    let c = Config::try_parse_from(["resource-loadgen", "--cpu", "1", "--hash-buffer-mb", "0"])
        .expect("parse");
    assert!(c.validate().is_err());
}
