use clap::{arg, ArgMatches, Command};
use mendlink::handlers::*;
use mendlink::{CheckScheduler, SiteChecker};
use std::io::Write;
use url::Url;

#[test]
fn resolve_site_dir_accepts_existing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let resolved = resolve_site_dir(dir.path().to_str().unwrap()).unwrap();
    assert_eq!(resolved, dir.path());
}

#[test]
fn resolve_site_dir_rejects_missing_directory() {
    let result = resolve_site_dir("/definitely/not/a/real/dir");
    assert!(result.is_err());
    assert!(result.unwrap_err().contains("Not a directory"));
}

#[test]
fn resolve_site_dir_rejects_plain_files() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(resolve_site_dir(file.path().to_str().unwrap()).is_err());
}

// A miniature of the real `check` argument set, enough to exercise
// build_check_config without dragging in the whole command tree.
fn check_matches(argv: &[&str]) -> ArgMatches {
    Command::new("test")
        .arg(
            arg!(-b --"base-url" <URL>)
                .required(false)
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(
            arg!(-t --"concurrency" <NUM>)
                .required(false)
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            arg!(--"timeout" <SECONDS>)
                .required(false)
                .value_parser(clap::value_parser!(u64)),
        )
        .get_matches_from([&["test"], argv].concat())
}

#[test]
fn check_config_defaults_without_flags() {
    let config = build_check_config(&check_matches(&[])).unwrap();
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.fallback_path, "/404.html");
    assert!(config.base_url.is_none());
}

#[test]
fn command_line_flags_override_defaults() {
    let config = build_check_config(&check_matches(&[
        "-b",
        "https://my.site/",
        "-t",
        "8",
        "--timeout",
        "2",
    ]))
    .unwrap();
    assert_eq!(config.base_url.as_deref(), Some("https://my.site/"));
    assert_eq!(config.concurrency, 8);
    assert_eq!(config.timeout_secs, 2);
    assert_eq!(config.base_host(), Some("my.site".to_string()));
}

#[test]
fn config_file_is_loaded_then_overridden_by_flags() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"timeout_secs": 9, "concurrency": 4}}"#).unwrap();

    let config = build_check_config(&check_matches(&[
        "-c",
        file.path().to_str().unwrap(),
        "--timeout",
        "1",
    ]))
    .unwrap();
    assert_eq!(config.concurrency, 4); // from file
    assert_eq!(config.timeout_secs, 1); // flag wins
}

#[test]
fn invalid_config_file_surfaces_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "nope").unwrap();
    let result = build_check_config(&check_matches(&["-c", file.path().to_str().unwrap()]));
    assert!(result.is_err());
}

#[tokio::test]
async fn closed_input_leaves_the_watch_scheduler_running() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = CheckScheduler::new(SiteChecker::new(), dir.path().to_path_buf());
    let (handle, join) = scheduler.spawn();

    // immediate end of input, as with `mendlink watch < /dev/null`
    let quit = watch_commands(tokio::io::BufReader::new(&b""[..]), &handle).await;
    assert!(!quit);
    // the scheduler must still be serving rechecks
    assert!(handle.recheck().await.is_ok());

    drop(handle);
    join.await.unwrap();
}

#[tokio::test]
async fn quit_command_ends_the_watch_session() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = CheckScheduler::new(SiteChecker::new(), dir.path().to_path_buf());
    let (handle, join) = scheduler.spawn();

    let quit = watch_commands(tokio::io::BufReader::new(&b"r\nq\n"[..]), &handle).await;
    assert!(quit);

    drop(handle);
    join.await.unwrap();
}

#[test]
fn build_checker_accepts_any_valid_config() {
    let config = build_check_config(&check_matches(&[])).unwrap();
    // smoke check: construction must not panic
    let _checker = build_checker(&config, true);
}
