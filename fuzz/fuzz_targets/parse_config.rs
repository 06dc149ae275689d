#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parse as TOML scenario file - only attempt if valid UTF-8
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(cfg) = toml::from_str::<plancheck_types::ConfigFile>(s) {
            let _ = plancheck_config::resolve_config(cfg, Default::default(), |_| None);
        }
    }
});
