#![no_main]

use id_token_verifier::models::{VerifyRequest, VerifyResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<VerifyRequest>(data);

    // Client side: any response body maps to some result
    if let Ok(response) = serde_json::from_slice::<VerifyResponse>(data) {
        let _ = response.into_result();
    }
});
