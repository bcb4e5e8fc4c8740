use sim_core::path::{expand_tilde, paths_equal, resolve_workspace_path};
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn resolve_workspace_path_explicit_overrides_everything() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        env::set_var("SIM_WORKSPACE_PATH", "/env/root");
    }
    let resolved = resolve_workspace_path(Some("/explicit/root")).unwrap();
    assert_eq!(resolved, PathBuf::from("/explicit/root"));
    unsafe {
        env::remove_var("SIM_WORKSPACE_PATH");
    }
}

#[test]
fn resolve_workspace_path_uses_env_var_when_no_explicit_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    unsafe {
        env::set_var("SIM_WORKSPACE_PATH", "/env/root");
    }
    let resolved = resolve_workspace_path(None).unwrap();
    assert_eq!(resolved, PathBuf::from("/env/root"));
    unsafe {
        env::remove_var("SIM_WORKSPACE_PATH");
    }
}

#[test]
fn expand_tilde_resolves_home_prefix() {
    if let Some(home) = std::env::var_os("HOME") {
        let expanded = expand_tilde("~/foo/bar");
        assert_eq!(expanded, PathBuf::from(home).join("foo/bar"));
    }
}

#[test]
fn paths_equal_same_directory() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path1 = temp_dir.path();
    let path2 = temp_dir.path();
    assert!(paths_equal(path1, path2));
}

#[test]
fn paths_equal_canonicalized_vs_itself() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let abs_path = temp_dir.path().canonicalize().unwrap();
    assert!(paths_equal(&abs_path, &abs_path));
}
