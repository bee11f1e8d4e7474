//! Display-name formatting.
//!
//! [`build_fname`] is the historical routine: it estimates the output length,
//! ignores the estimate, and writes wherever the cursor goes. Its destination
//! is a [`GuardedBuffer`] so that running past the end is recorded rather
//! than undefined.
//!
//! [`build_fname_checked`] takes the capacity from the destination slice and
//! uses the estimate as a pre-flight check.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::buffer::GuardedBuffer;
use crate::error::{FnameError, FnameResult};
use crate::gecos::{Scanner, Token, estimate_len, strlen};
use crate::trace::{FormatObserver, TraceEvent};

/// Which formatter a caller runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Capacity is never consulted; overflow is only observed.
    #[default]
    Unchecked,
    /// Capacity is explicit and enforced.
    Checked,
}

/// What the checked formatter does when the name does not fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail with `CapacityExceeded` and leave the destination untouched.
    #[default]
    Reject,
    /// Write as much as fits, then NUL-terminate.
    Truncate,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Unchecked => write!(f, "unchecked"),
            Mode::Checked => write!(f, "checked"),
        }
    }
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverflowPolicy::Reject => write!(f, "reject"),
            OverflowPolicy::Truncate => write!(f, "truncate"),
        }
    }
}

/// Build the display name from `gecos` into `buf`, trusting `buf` to be big
/// enough.
///
/// `&` is replaced by `login` with its first byte uppercased; scanning stops
/// at `,`, `;`, `%` or NUL; a leading `*` is skipped. The result is
/// NUL-terminated. Any byte that falls past `buf.capacity()` is recorded as a
/// violation on the buffer.
pub fn build_fname<B: AsRef<[u8]> + AsMut<[u8]>>(
    gecos: &[u8],
    login: &[u8],
    buf: &mut GuardedBuffer<B>,
    observer: &mut dyn FormatObserver,
) {
    // Computed and never compared with the capacity.
    let estimate = estimate_len(gecos, login);
    trace!(estimate, "estimated display name length");

    let login_len = strlen(login);
    let mut bp = 0usize;

    for token in Scanner::new(gecos) {
        match token {
            Token::Login => {
                observer.event(TraceEvent::Substitute {
                    buf_len: buf.strlen_at(bp),
                    login_len,
                });
                for (i, &b) in login[..login_len].iter().enumerate() {
                    buf.write(bp + i, b);
                }
                buf.write(bp + login_len, 0);
                let first = buf.read(bp);
                buf.write(bp, first.to_ascii_uppercase());
                while buf.read(bp) != 0 {
                    bp += 1;
                }
            }
            Token::Literal(b) => {
                buf.write(bp, b);
                bp += 1;
                observer.event(TraceEvent::Literal { offset: bp });
            }
        }
    }
    buf.write(bp, 0);

    observer.event(TraceEvent::Finished {
        capacity: buf.capacity(),
        written: buf.strlen_at(0),
    });

    if buf.overflowed() {
        warn!(
            capacity = buf.capacity(),
            violations = buf.violations().len(),
            "display name overran destination buffer"
        );
    }
}

/// Build the display name into `dest`, whose length is the capacity.
///
/// The output plus its NUL must fit. If it does not, `policy` decides
/// between failing and truncating. Returns the number of bytes written
/// before the NUL.
pub fn build_fname_checked(
    gecos: &[u8],
    login: &[u8],
    dest: &mut [u8],
    policy: OverflowPolicy,
    observer: &mut dyn FormatObserver,
) -> FnameResult<usize> {
    let capacity = dest.len();
    let estimate = estimate_len(gecos, login);
    let required = estimate.saturating_add(1);

    let limit = if required <= capacity {
        estimate
    } else {
        match policy {
            OverflowPolicy::Truncate if capacity > 0 => {
                warn!(required, capacity, "truncating display name");
                capacity - 1
            }
            _ => return Err(FnameError::CapacityExceeded { required, capacity }),
        }
    };

    let login = &login[..strlen(login)];
    let mut bp = 0usize;

    for token in Scanner::new(gecos) {
        match token {
            Token::Login => {
                observer.event(TraceEvent::Substitute {
                    buf_len: strlen(&dest[bp..]),
                    login_len: login.len(),
                });
                let n = login.len().min(limit - bp);
                dest[bp..bp + n].copy_from_slice(&login[..n]);
                if n > 0 {
                    dest[bp] = dest[bp].to_ascii_uppercase();
                }
                bp += n;
                if n < login.len() {
                    break;
                }
            }
            Token::Literal(b) => {
                if bp == limit {
                    break;
                }
                dest[bp] = b;
                bp += 1;
                observer.event(TraceEvent::Literal { offset: bp });
            }
        }
    }
    dest[bp] = 0;

    observer.event(TraceEvent::Finished {
        capacity,
        written: bp,
    });
    Ok(bp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::CapacityViolation;
    use crate::gecos::expand;
    use crate::trace::{NoopObserver, RecordingObserver};

    fn unchecked(gecos: &[u8], login: &[u8], capacity: usize) -> GuardedBuffer {
        let mut buf = GuardedBuffer::with_capacity(capacity);
        build_fname(gecos, login, &mut buf, &mut NoopObserver);
        buf
    }

    fn checked(gecos: &[u8], login: &[u8], capacity: usize) -> FnameResult<Vec<u8>> {
        let mut dest = vec![0xAAu8; capacity];
        let n = build_fname_checked(
            gecos,
            login,
            &mut dest,
            OverflowPolicy::Reject,
            &mut NoopObserver,
        )?;
        assert_eq!(dest[n], 0);
        dest.truncate(n);
        Ok(dest)
    }

    // ===== Concrete scenarios =====

    #[test]
    fn plain_name_copied_unchanged() {
        let buf = unchecked(b"John Doe", b"jdoe", 32);
        assert_eq!(&buf.as_bytes()[..9], b"John Doe\0");
        assert!(!buf.overflowed());
        assert_eq!(checked(b"John Doe", b"jdoe", 9).unwrap(), b"John Doe");
    }

    #[test]
    fn sentinel_stripped_and_stops_at_comma() {
        let buf = unchecked(b"*Jane Smith,Room 5", b"jsmith", 32);
        assert_eq!(&buf.as_bytes()[..11], b"Jane Smith\0");
        assert_eq!(
            checked(b"*Jane Smith,Room 5", b"jsmith", 11).unwrap(),
            b"Jane Smith"
        );
    }

    #[test]
    fn ampersand_substitutes_capitalized_login() {
        let buf = unchecked(b"&, Manager", b"al", 8);
        assert_eq!(&buf.as_bytes()[..3], b"Al\0");
        assert_eq!(checked(b"&, Manager", b"al", 3).unwrap(), b"Al");
    }

    #[test]
    fn undersized_buffer_overflow_is_detected() {
        // Five bytes, the loopfrog benchmark buffer size.
        let buf = unchecked(b"John Doe", b"jdoe", 5);
        assert!(buf.overflowed());
        let offsets: Vec<usize> = buf.violations().iter().map(|v| v.offset).collect();
        assert_eq!(offsets, vec![5, 6, 7, 8]);
        assert_eq!(buf.contents(), b"John Doe");
        assert_eq!(buf.spilled(), b"Doe\0");

        let err = checked(b"John Doe", b"jdoe", 5).unwrap_err();
        assert!(matches!(
            err,
            FnameError::CapacityExceeded {
                required: 9,
                capacity: 5
            }
        ));
    }

    #[test]
    fn overflow_through_substitution_is_detected() {
        let buf = unchecked(b"&", b"longlogin", 4);
        assert!(buf.overflowed());
        assert_eq!(buf.contents(), b"Longlogin");
        assert!(buf.violations().contains(&CapacityViolation {
            offset: 9,
            capacity: 4
        }));
    }

    // ===== Scanning properties =====

    #[test]
    fn scan_resumes_after_substituted_text() {
        let buf = unchecked(b"&x&", b"ab", 16);
        assert_eq!(buf.contents(), b"AbxAb");
        assert_eq!(checked(b"&x&", b"ab", 6).unwrap(), b"AbxAb");
    }

    #[test]
    fn terminators_and_tail_never_appear() {
        let inputs: [&[u8]; 4] = [b"Ann;x", b"Ann%x", b"Ann,x", b"Ann\0x"];
        for gecos in inputs {
            let buf = unchecked(gecos, b"ann", 16);
            assert_eq!(buf.contents(), b"Ann");
            assert_eq!(checked(gecos, b"ann", 16).unwrap(), b"Ann");
        }
    }

    #[test]
    fn sentinel_never_in_output() {
        let buf = unchecked(b"*", b"x", 4);
        assert_eq!(buf.contents(), b"");
        let buf = unchecked(b"**Bob", b"x", 8);
        assert_eq!(buf.contents(), b"*Bob");
    }

    #[test]
    fn login_stops_at_interior_nul() {
        let buf = unchecked(b"&!", b"ab\0cd", 8);
        assert_eq!(buf.contents(), b"Ab!");
        assert_eq!(checked(b"&!", b"ab\0cd", 4).unwrap(), b"Ab!");
    }

    #[test]
    fn empty_login_substitutes_nothing() {
        let buf = unchecked(b"a&b", b"", 8);
        assert_eq!(buf.contents(), b"ab");
        assert_eq!(checked(b"a&b", b"", 3).unwrap(), b"ab");
    }

    #[test]
    fn non_ascii_first_byte_left_alone() {
        let login = "émile".as_bytes();
        let buf = unchecked(b"&", login, 16);
        assert_eq!(buf.contents(), login);
    }

    #[test]
    fn unchecked_matches_reference_expansion() {
        let cases: [(&[u8], &[u8]); 5] = [
            (b"Mr. & Sr.", b"smith"),
            (b"*&&", b"qq"),
            (b"", b"root"),
            (b"&%&", b"a"),
            (b"x y z", b"unused"),
        ];
        for (gecos, login) in cases {
            let buf = unchecked(gecos, login, 64);
            assert_eq!(buf.contents(), expand(gecos, login));
        }
    }

    #[test]
    fn rerun_is_byte_identical() {
        let mut a = GuardedBuffer::new(b"stale content!".to_vec());
        let mut b = GuardedBuffer::new(b"stale content!".to_vec());
        build_fname(b"&, Manager", b"al", &mut a, &mut NoopObserver);
        build_fname(b"&, Manager", b"al", &mut b, &mut NoopObserver);
        assert_eq!(a.as_bytes(), b.as_bytes());

        build_fname(b"&, Manager", b"al", &mut a, &mut NoopObserver);
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    // ===== Checked formatter =====

    #[test]
    fn checked_exact_fit() {
        assert_eq!(checked(b"abc", b"", 4).unwrap(), b"abc");
        assert!(checked(b"abc", b"", 3).is_err());
    }

    #[test]
    fn checked_reject_leaves_destination_untouched() {
        let mut dest = *b"zzzz";
        let err = build_fname_checked(
            b"&",
            b"longer",
            &mut dest,
            OverflowPolicy::Reject,
            &mut NoopObserver,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FnameError::CapacityExceeded {
                required: 7,
                capacity: 4
            }
        ));
        assert_eq!(&dest, b"zzzz");
    }

    #[test]
    fn checked_truncate_writes_prefix() {
        let mut dest = [0xFFu8; 5];
        let n = build_fname_checked(
            b"John Doe",
            b"jdoe",
            &mut dest,
            OverflowPolicy::Truncate,
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(n, 4);
        assert_eq!(&dest, b"John\0");
    }

    #[test]
    fn checked_truncate_inside_login() {
        let mut dest = [0u8; 4];
        let n = build_fname_checked(
            b"x&y",
            b"alice",
            &mut dest,
            OverflowPolicy::Truncate,
            &mut NoopObserver,
        )
        .unwrap();
        assert_eq!(n, 3);
        assert_eq!(&dest, b"xAl\0");
    }

    #[test]
    fn checked_truncate_zero_capacity_fails() {
        let err = build_fname_checked(
            b"a",
            b"",
            &mut [],
            OverflowPolicy::Truncate,
            &mut NoopObserver,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FnameError::CapacityExceeded {
                required: 2,
                capacity: 0
            }
        ));
    }

    #[test]
    fn checked_empty_output_needs_one_byte() {
        assert_eq!(checked(b",rest", b"x", 1).unwrap(), b"");
        assert!(checked(b"", b"x", 0).is_err());
    }

    // ===== Diagnostics =====

    #[test]
    fn trace_for_literals_reports_running_offset() {
        let mut obs = RecordingObserver::new();
        let mut buf = GuardedBuffer::with_capacity(8);
        build_fname(b"ab", b"x", &mut buf, &mut obs);
        assert_eq!(
            obs.events,
            vec![
                TraceEvent::Literal { offset: 1 },
                TraceEvent::Literal { offset: 2 },
                TraceEvent::Finished {
                    capacity: 8,
                    written: 2
                },
            ]
        );
    }

    #[test]
    fn trace_for_substitution_reports_stale_length() {
        let mut obs = RecordingObserver::new();
        let mut buf = GuardedBuffer::new(b"zzzz\0\0\0\0".to_vec());
        build_fname(b"&", b"q", &mut buf, &mut obs);
        assert_eq!(
            obs.events[0],
            TraceEvent::Substitute {
                buf_len: 4,
                login_len: 1
            }
        );
        assert_eq!(
            obs.lines().last().unwrap(),
            "buf can store at most 8 bytes; strlen(buf) = 1"
        );
    }

    #[test]
    fn trace_reports_overflowing_length() {
        let mut obs = RecordingObserver::new();
        let mut buf = GuardedBuffer::with_capacity(5);
        build_fname(b"John Doe", b"jdoe", &mut buf, &mut obs);
        assert_eq!(
            obs.events.last(),
            Some(&TraceEvent::Finished {
                capacity: 5,
                written: 8
            })
        );
    }

    #[test]
    fn checked_and_unchecked_trace_alike_when_it_fits() {
        let mut a = RecordingObserver::new();
        let mut b = RecordingObserver::new();
        let mut guarded = GuardedBuffer::with_capacity(16);
        let mut dest = [0u8; 16];
        build_fname(b"&-x", b"ok", &mut guarded, &mut a);
        build_fname_checked(b"&-x", b"ok", &mut dest, OverflowPolicy::Reject, &mut b)
            .unwrap();
        assert_eq!(a.events, b.events);
    }
}
