#![no_main]

use id_token_verifier::decode_unverified;
use id_token_verifier::models::SignedToken;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary text as a compact token: decode errors only, never a panic
    if let Ok(raw) = std::str::from_utf8(data) {
        let token = SignedToken::from(raw);
        let _ = decode_unverified(&token);
        let _ = token.parse();
    }
});
