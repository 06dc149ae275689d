#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = serde_json::from_slice::<plancheck_types::Report>(data) {
        let _ = plancheck_app::render_markdown(&report);
        let _ = plancheck_app::render_console(&report);
        let _ = plancheck_app::github_annotations(&report);
    }
});
