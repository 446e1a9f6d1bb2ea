use super::*;
use log::{Level, Metadata, Record};
use serial_test::serial;

#[test]
#[serial]
fn get_level_from_env_parses_cases() {
    let cases: &[(Option<&str>, Level)] = &[
        (None, Level::Info),
        (Some("debug"), Level::Debug),
        (Some("DEBUG"), Level::Debug),
        (Some("info"), Level::Info),
        (Some("warn"), Level::Warn),
        (Some("WARN"), Level::Warn),
        (Some("error"), Level::Error),
        (Some("trace"), Level::Trace),
        (Some("garbage"), Level::Info),
        (Some("off"), Level::Info),
    ];

    for (value, expected) in cases {
        match value {
            Some(v) => unsafe { std::env::set_var(PROGRAM_LOG_LEVEL, v) },
            None => unsafe { std::env::remove_var(PROGRAM_LOG_LEVEL) },
        }

        let lvl = get_level_from_env();
        assert_eq!(
            lvl, *expected,
            "env {:?} should yield level {:?}, got {:?}",
            value, expected, lvl
        );
    }

    unsafe { std::env::remove_var(PROGRAM_LOG_LEVEL) };
}

#[test]
#[serial]
fn log_file_env_selects_target() {
    unsafe { std::env::set_var(PROGRAM_LOG_FILE, "-") };
    assert_eq!(get_path_from_env(), None);

    unsafe { std::env::set_var(PROGRAM_LOG_FILE, "/tmp/courier-test.log") };
    assert_eq!(
        get_path_from_env(),
        Some(PathBuf::from("/tmp/courier-test.log"))
    );

    unsafe { std::env::remove_var(PROGRAM_LOG_FILE) };
    assert_eq!(get_path_from_env(), Some(default_log_path()));
}

#[test]
fn enabled_respects_level_threshold() {
    let levels = [
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    for logger_level in levels {
        let logger = Logger {
            level: logger_level,
            target: LogTarget::Stderr,
        };

        for record_level in levels {
            let meta = Metadata::builder()
                .level(record_level)
                .target("test_target")
                .build();

            let expected = record_level <= logger_level;
            assert_eq!(
                logger.enabled(&meta),
                expected,
                "logger level {:?}, record level {:?}",
                logger_level,
                record_level
            );
        }
    }
}

#[test]
fn file_logger_appends_formatted_lines() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("nested").join("courier.log");

    let logger = Logger {
        level: Level::Info,
        target: open_target(Some(&path)),
    };

    let cases = [
        (Level::Debug, "dropped"),
        (Level::Info, "kept info"),
        (Level::Error, "kept error"),
    ];

    for (lvl, msg) in &cases {
        let args = format_args!("{msg}");
        let record = Record::builder()
            .level(*lvl)
            .target("courier")
            .args(args)
            .build();
        logger.log(&record);
    }
    logger.flush();

    let contents = std::fs::read_to_string(&path).expect("read log");
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("INFO [courier] kept info"), "{}", lines[0]);
    assert!(lines[1].ends_with("ERROR [courier] kept error"), "{}", lines[1]);
}

#[test]
fn stderr_logger_does_not_panic() {
    let logger = Logger {
        level: Level::Info,
        target: LogTarget::Stderr,
    };

    let args = format_args!("hello");
    let record = Record::builder()
        .level(Level::Info)
        .target("t")
        .args(args)
        .build();
    logger.log(&record);
    logger.flush();
}
