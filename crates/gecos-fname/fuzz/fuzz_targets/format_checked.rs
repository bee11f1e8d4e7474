#![no_main]
use gecos_fname::format::{OverflowPolicy, build_fname_checked};
use gecos_fname::gecos::{estimate_len, expand};
use gecos_fname::trace::NoopObserver;
use libfuzzer_sys::fuzz_target;

/// Input layout: [capacity, truncate flag, gecos.. '\n' login..]
fuzz_target!(|data: &[u8]| {
    let [capacity, flag, rest @ ..] = data else {
        return;
    };
    let (gecos, login) = match rest.iter().position(|&b| b == b'\n') {
        Some(i) => (&rest[..i], &rest[i + 1..]),
        None => (rest, &[][..]),
    };
    let capacity = *capacity as usize;
    let policy = if flag & 1 == 1 {
        OverflowPolicy::Truncate
    } else {
        OverflowPolicy::Reject
    };

    let mut dest = vec![0xA5u8; capacity];
    let result = build_fname_checked(gecos, login, &mut dest, policy, &mut NoopObserver);
    let estimate = estimate_len(gecos, login);
    let fits = estimate < capacity;

    match result {
        Ok(n) => {
            // Invariant: output plus NUL stays inside the destination
            assert!(n < capacity, "wrote {n} bytes into {capacity}");
            assert_eq!(dest[n], 0, "missing NUL terminator");
            let full = expand(gecos, login);
            assert_eq!(&dest[..n], &full[..n], "output is not a prefix of the name");
            if fits {
                assert_eq!(n, estimate, "name fit but was shortened");
            } else {
                assert_eq!(policy, OverflowPolicy::Truncate, "overflow accepted under reject");
            }
        }
        Err(_) => {
            assert!(!fits, "rejected a name that fits: {gecos:?} {login:?}");
            if policy == OverflowPolicy::Reject {
                assert!(dest.iter().all(|&b| b == 0xA5), "rejected call wrote bytes");
            }
        }
    }
});
