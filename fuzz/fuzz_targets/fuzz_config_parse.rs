#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(config) = toml::from_str::<skycast::Config>(text) {
        // Parsed configs must validate without panicking.
        let _ = config.validate();
        let _ = config.sessions.expiration_policy();
        let _ = config.sessions.context_limits();
    }
});
