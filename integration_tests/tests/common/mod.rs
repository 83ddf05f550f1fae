#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(relative)
}

pub fn ensure_test_settings() {
    INIT.call_once(|| {
        let settings_path = fixture("test_compiler_settings.json");

        debug_assert!(
            settings_path.exists(),
            "missing test compiler settings at {}",
            settings_path.display()
        );

        std::env::set_var(crowd_config::settings::SETTINGS_PATH_ENV, &settings_path);
    });
}
