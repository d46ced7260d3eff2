use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

const SMT_CONFIG: &str = "SMT_CONFIG";

pub fn get_config_path() -> Option<String> {
    std::env::var(SMT_CONFIG).ok()
}

const DEFAULT_DATA_DIR: &str = "/var/lib/smt/data";

pub fn get_default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

const DEFAULT_STATE_DIR: &str = "/var/lib/smt/state";

pub fn get_default_state_dir() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DIR)
}

const DEFAULT_RRDTOOL: &str = "rrdtool";

pub fn get_default_rrdtool() -> PathBuf {
    PathBuf::from(DEFAULT_RRDTOOL)
}

static UNSAFE_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^A-Za-z0-9_-]").expect("static regex is valid"));

/// Replace everything outside `[A-Za-z0-9_-]` so the name can be used in a
/// file name
pub fn safe_name(name: &str) -> String {
    UNSAFE_CHARACTERS.replace_all(name, "_").into_owned()
}
