#![no_main]
use libfuzzer_sys::fuzz_target;
use compilerbot::protocol::Reply;

fuzz_target!(|data: &[u8]| {
    // Anything but the two exact replies is a violation
    match Reply::parse(data) {
        Reply::Accept => assert_eq!(data.trim_ascii(), b"OK"),
        Reply::Reject => assert_eq!(data.trim_ascii(), b"Not OK"),
        Reply::ProtocolViolation(_) => {}
    }
    let _ = Reply::is_complete(data);
});
