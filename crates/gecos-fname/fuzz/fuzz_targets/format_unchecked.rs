#![no_main]
use gecos_fname::buffer::GuardedBuffer;
use gecos_fname::format::build_fname;
use gecos_fname::gecos::{estimate_len, expand};
use gecos_fname::trace::NoopObserver;
use libfuzzer_sys::fuzz_target;

/// Input layout: [capacity, gecos.. '\n' login..]
fuzz_target!(|data: &[u8]| {
    let [capacity, rest @ ..] = data else {
        return;
    };
    let (gecos, login) = match rest.iter().position(|&b| b == b'\n') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &[][..]),
    };

    let mut buf = GuardedBuffer::with_capacity(*capacity as usize);
    build_fname(gecos, login, &mut buf, &mut NoopObserver);

    // Invariant: the guard sees an overrun exactly when the name plus NUL
    // does not fit, and never loses a byte of the name
    let estimate = estimate_len(gecos, login);
    assert_eq!(
        buf.overflowed(),
        estimate >= buf.capacity(),
        "guard disagrees with estimate {estimate} for capacity {}",
        buf.capacity()
    );
    assert_eq!(buf.contents(), expand(gecos, login));
    assert!(
        buf.violations().iter().all(|v| v.offset >= v.capacity),
        "violation recorded inside capacity"
    );
});
