#![no_main]

use libfuzzer_sys::fuzz_target;
use skycast::agent::TurnRequest;
use skycast::sessions::SessionService;

fuzz_target!(|data: &[u8]| {
    let Ok(request) = serde_json::from_slice::<TurnRequest>(data) else {
        return;
    };
    let service = SessionService::default();
    match service.append_and_build_context(request.session_id.as_deref(), &request.message) {
        Ok((outcome, window)) => {
            assert!(outcome.created);
            assert_eq!(window.latest(), Some(&outcome.message));
        }
        Err(_) => assert!(service.list_sessions().is_empty()),
    }
});
