use std::fs;

use abi_facts::commands::{
    generate_command, init_config_command, inspect_command, load_manifest, GenerateArgs,
    RunManifest,
};
use tempfile::tempdir;

#[test]
fn manifest_yaml_paths_resolve_against_manifest_dir() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("run.yaml");
    fs::write(
        &path,
        "main:\n  - bin/app\nlibraries:\n  - /opt/lib/libz.so\noutput_dir: out\n",
    )
    .unwrap();

    let manifest = load_manifest(&path).expect("manifest");
    assert_eq!(manifest.main, vec![temp.path().join("bin/app")]);
    assert_eq!(manifest.libraries, vec![std::path::PathBuf::from("/opt/lib/libz.so")]);
    assert!(manifest.compilers.is_empty());
    assert_eq!(manifest.output_dir, Some(temp.path().join("out")));
}

#[test]
fn manifest_json_is_parsed_by_extension() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("run.json");
    fs::write(&path, r#"{"main": ["/bin/app"], "compilers": ["/usr/bin/cc"]}"#).unwrap();

    let manifest = load_manifest(&path).expect("manifest");
    assert_eq!(
        manifest,
        RunManifest {
            main: vec!["/bin/app".into()],
            libraries: Vec::new(),
            compilers: vec!["/usr/bin/cc".into()],
            output_dir: None,
        }
    );
}

#[test]
fn manifest_without_mains_is_rejected() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("run.yaml");
    fs::write(&path, "main: []\nlibraries: [/lib/libc.so.6]\n").unwrap();
    let err = load_manifest(&path).unwrap_err();
    assert!(err.to_string().contains("at least one main binary"), "unexpected error: {err}");
}

#[test]
fn malformed_manifest_reports_parse_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("run.json");
    fs::write(&path, "{ nope").unwrap();
    let err = load_manifest(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse run manifest JSON"));

    let err = load_manifest(&temp.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read run manifest"));
}

#[test]
fn generate_requires_a_main_binary() {
    let temp = tempdir().unwrap();
    let args = GenerateArgs {
        out_dir: Some(temp.path().join("out").display().to_string()),
        no_ldd: true,
        ..GenerateArgs::default()
    };
    let err = generate_command(&args).unwrap_err();
    assert!(err.to_string().contains("No main binaries given"), "unexpected error: {err}");
}

#[test]
fn generate_fails_for_missing_main() {
    let temp = tempdir().unwrap();
    let args = GenerateArgs {
        mains: vec![temp.path().join("ghost").display().to_string()],
        out_dir: Some(temp.path().join("out").display().to_string()),
        no_ldd: true,
        ..GenerateArgs::default()
    };
    let err = generate_command(&args).unwrap_err();
    assert!(format!("{err:#}").contains("Input binary not found"), "unexpected error: {err:#}");
    assert!(!temp.path().join("out").join("run-summary.json").exists());
}

#[test]
fn init_config_refuses_to_overwrite_without_force() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("abi-facts.json");
    let path_str = path.display().to_string();

    init_config_command(&path_str, false).expect("first write");
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["max_depth"], 256);

    let err = init_config_command(&path_str, false).unwrap_err();
    assert!(err.to_string().contains("use --force"));
    init_config_command(&path_str, true).expect("forced write");
}

#[test]
fn inspect_rejects_non_elf_input() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("readme.txt");
    fs::write(&path, "hello").unwrap();
    let err = inspect_command(&path.display().to_string(), false).unwrap_err();
    assert!(err.to_string().contains("Failed to load binary"));
}
