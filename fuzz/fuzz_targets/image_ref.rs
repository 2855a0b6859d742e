#![no_main]

use containertree_core::ImageRef;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(image) = ImageRef::parse(text) {
        assert!(!image.repo_name.is_empty());
        assert!(!image.namespace.is_empty());
        assert!(!image.repo_tag.is_empty());
        assert!(image.full_uri().starts_with(&image.node_uri()));
    }
});
