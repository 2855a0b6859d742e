#![no_main]

use containertree_core::dockerfile::from_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Some(from) = from_line(text) {
        assert!(!from.image.is_empty());
        assert!(!from.image.contains(char::is_whitespace));
    }
});
