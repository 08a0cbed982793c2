//! Console logger
//!
//! Routes the `log` facade to the browser console. Only the extension's own
//! crates are logged.

use std::sync::Once;

use log::{Level, LevelFilter};

const MODULE_PREFIX: &str = "uw_";

static INSTALL: Once = Once::new();

/// Install the console logger. Repeated calls only change the level.
pub fn install(level: LevelFilter) {
    INSTALL.call_once(|| wasm_logger::init(wasm_logger::Config::new(Level::Trace).module_prefix(MODULE_PREFIX)));
    log::set_max_level(level);
}

pub fn parse_level(level: &str) -> LevelFilter {
    level.parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use wasm_bindgen_test::*;

    use super::*;

    #[wasm_bindgen_test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("chatty"), LevelFilter::Info);
    }
}
