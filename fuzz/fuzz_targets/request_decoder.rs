#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Decoding and wrapping must not panic on any request line
    if let Ok(fragment) = compilerbot::protocol::decode_request(data) {
        let (unit, _) = compilerbot::judge::build_unit(&fragment);
        assert_eq!(unit.matches('{').count(), 1);
        assert_eq!(unit.matches('}').count(), 1);
        assert!(!unit.contains('#'));
    }
});
