#![no_main]
use gecos_fname::gecos::{TERMINATORS, estimate_len, expand, strip_sentinel};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let split = data.len() / 2;
    let (gecos, login) = data.split_at(split);

    let name = expand(gecos, login);
    assert_eq!(estimate_len(gecos, login), name.len());

    // Without '&' the name is a prefix of the stripped field that stops
    // before any terminator
    if !gecos.contains(&b'&') {
        let stripped = strip_sentinel(gecos);
        assert!(stripped.starts_with(&name));
        assert!(!name.iter().any(|b| *b == 0 || TERMINATORS.contains(b)));
    }
});
