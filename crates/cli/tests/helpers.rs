use std::fs;
use std::path::Path;

use abi_facts::{
    canonicalize_or_current, resolve_against, sha256_file, LogFormat, LogLevel,
};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_resolves_existing_relative_path() {
    let original = std::env::current_dir().expect("cwd");
    let tmp = tempdir().expect("tempdir");
    let subdir = tmp.path().join("nested");
    fs::create_dir_all(&subdir).expect("create nested");
    std::env::set_current_dir(tmp.path()).expect("chdir tmp");

    let result = canonicalize_or_current("nested").expect("canonicalize nested");
    assert_eq!(result, subdir.canonicalize().expect("canonicalize subdir"));

    std::env::set_current_dir(original).expect("restore cwd");
}

#[test]
fn canonicalize_or_current_keeps_absolute_missing_path() {
    let tmp = tempdir().expect("tempdir");
    let missing = tmp.path().join("not-yet");
    assert_eq!(canonicalize_or_current(missing.to_str().unwrap()).unwrap(), missing);
}

#[test]
fn resolve_against_only_touches_relative_paths() {
    let base = Path::new("/base");
    assert_eq!(resolve_against(base, Path::new("lib.so")), Path::new("/base/lib.so"));
    assert_eq!(resolve_against(base, Path::new("/abs/lib.so")), Path::new("/abs/lib.so"));
}

#[test]
fn sha256_file_matches_known_digest() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("blob");
    fs::write(&path, b"abc").unwrap();
    let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    assert_eq!(sha256_file(&path).unwrap(), expected);
}

#[test]
fn sha256_file_reports_missing_file() {
    let tmp = tempdir().expect("tempdir");
    let err = sha256_file(&tmp.path().join("absent")).unwrap_err();
    assert!(err.to_string().contains("Failed to open binary for hashing"));
}

#[test]
fn log_options_parse_case_insensitively() {
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert_eq!("Warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert!("loud".parse::<LogLevel>().is_err());
    assert!("xml".parse::<LogFormat>().is_err());
}
