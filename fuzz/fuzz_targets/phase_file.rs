#![no_main]

use libfuzzer_sys::fuzz_target;
use simple_test::fixtures::PhaseFile;
use simple_test::harness::Scenario;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(phase) = PhaseFile::parse(s) {
            // Every accepted phase file must be programmable in every scenario
            for scenario in Scenario::SEQUENCE {
                let _ = scenario.outputs(&phase);
            }
        }
    }
});
