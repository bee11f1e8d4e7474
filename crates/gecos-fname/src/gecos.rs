//! GECOS full-name scanning.
//!
//! Strings are byte slices that model NUL-terminated C strings: the first
//! `0x00` byte (or the end of the slice) marks the logical end.
//!
//! Both the length estimate and the copy pass walk the field with the same
//! [`Scanner`], which stops at the first `,`, `;`, `%` or end of string.

/// Leading marker stripped before processing.
pub const SENTINEL: u8 = b'*';

/// Replaced by the login name, first character uppercased.
pub const SUBSTITUTE: u8 = b'&';

/// Segment delimiters. Scanning stops at the first one.
pub const TERMINATORS: &[u8] = b",;%";

/// Length of a NUL-terminated byte string, or the slice length without a NUL.
pub fn strlen(s: &[u8]) -> usize {
    s.iter().position(|&b| b == 0).unwrap_or(s.len())
}

/// True for NUL and for the segment delimiters.
pub fn is_terminator(b: u8) -> bool {
    b == 0 || TERMINATORS.contains(&b)
}

/// Skip a leading `*`.
pub fn strip_sentinel(gecos: &[u8]) -> &[u8] {
    match gecos.split_first() {
        Some((&SENTINEL, rest)) => rest,
        _ => gecos,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Scanning,
    Terminated,
}

/// One unit of output produced by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Literal(u8),
    Login,
}

/// Walks the name segment of a GECOS field.
///
/// `Scanning` until a terminator, NUL or end of input is seen, then
/// `Terminated` for good. The terminating byte is never consumed.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
    state: ScanState,
}

impl<'a> Scanner<'a> {
    /// Start scanning `gecos`, skipping the sentinel if present.
    pub fn new(gecos: &'a [u8]) -> Self {
        Self {
            input: strip_sentinel(gecos),
            pos: 0,
            state: ScanState::Scanning,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Index into the (sentinel-stripped) input of the next byte to read.
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl Iterator for Scanner<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.state == ScanState::Terminated {
            return None;
        }
        match self.input.get(self.pos).copied() {
            Some(b) if !is_terminator(b) => {
                self.pos += 1;
                if b == SUBSTITUTE {
                    Some(Token::Login)
                } else {
                    Some(Token::Literal(b))
                }
            }
            _ => {
                self.state = ScanState::Terminated;
                None
            }
        }
    }
}

/// Estimated display-name length, excluding the NUL.
///
/// Each `&` counts as `strlen(login)`, every other byte as one.
pub fn estimate_len(gecos: &[u8], login: &[u8]) -> usize {
    let login_len = strlen(login);
    Scanner::new(gecos)
        .map(|token| match token {
            Token::Login => login_len,
            Token::Literal(_) => 1,
        })
        .fold(0usize, usize::saturating_add)
}

/// The display name as an owned byte vector, without the NUL.
///
/// Reference rendering that the formatter tests and fuzz targets compare
/// buffer contents against.
pub fn expand(gecos: &[u8], login: &[u8]) -> Vec<u8> {
    let login = &login[..strlen(login)];
    let mut out = Vec::with_capacity(estimate_len(gecos, login));
    for token in Scanner::new(gecos) {
        match token {
            Token::Literal(b) => out.push(b),
            Token::Login => {
                let start = out.len();
                out.extend_from_slice(login);
                if let Some(first) = out.get_mut(start) {
                    *first = first.to_ascii_uppercase();
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strlen_stops_at_nul() {
        assert_eq!(strlen(b"abc\0def"), 3);
        assert_eq!(strlen(b"abc"), 3);
        assert_eq!(strlen(b""), 0);
        assert_eq!(strlen(b"\0"), 0);
    }

    #[test]
    fn sentinel_only_stripped_once_and_only_at_start() {
        assert_eq!(strip_sentinel(b"*Jane"), b"Jane");
        assert_eq!(strip_sentinel(b"**Jane"), b"*Jane");
        assert_eq!(strip_sentinel(b"Ja*ne"), b"Ja*ne");
        assert_eq!(strip_sentinel(b""), b"");
    }

    #[test]
    fn scanner_stops_at_each_terminator() {
        let inputs: [&[u8]; 5] = [b"ab,cd", b"ab;cd", b"ab%cd", b"ab\0cd", b"ab"];
        for gecos in inputs {
            let mut scanner = Scanner::new(gecos);
            let tokens: Vec<_> = scanner.by_ref().collect();
            assert_eq!(tokens, vec![Token::Literal(b'a'), Token::Literal(b'b')]);
            assert_eq!(scanner.state(), ScanState::Terminated);
            assert_eq!(scanner.position(), 2);
        }
    }

    #[test]
    fn scanner_stays_terminated() {
        let mut scanner = Scanner::new(b",abc");
        assert_eq!(scanner.next(), None);
        assert_eq!(scanner.next(), None);
        assert_eq!(scanner.position(), 0);
    }

    #[test]
    fn scanner_yields_login_for_ampersand() {
        let tokens: Vec<_> = Scanner::new(b"&x").collect();
        assert_eq!(tokens, vec![Token::Login, Token::Literal(b'x')]);
    }

    #[test]
    fn estimate_counts_login_per_ampersand() {
        assert_eq!(estimate_len(b"John Doe", b"jdoe"), 8);
        assert_eq!(estimate_len(b"*Jane Smith,Room 5", b"jsmith"), 10);
        assert_eq!(estimate_len(b"&, Manager", b"al"), 2);
        assert_eq!(estimate_len(b"& & &", b"bob"), 11);
        assert_eq!(estimate_len(b"&", b"lo\0gin"), 2);
        assert_eq!(estimate_len(b"", b"x"), 0);
    }

    #[test]
    fn expand_concrete_scenarios() {
        assert_eq!(expand(b"John Doe", b"jdoe"), b"John Doe");
        assert_eq!(expand(b"*Jane Smith,Room 5", b"jsmith"), b"Jane Smith");
        assert_eq!(expand(b"&, Manager", b"al"), b"Al");
        assert_eq!(expand(b"Mr. & Sr.", b"smith"), b"Mr. Smith Sr.");
    }

    #[test]
    fn expand_length_matches_estimate() {
        let cases: [(&[u8], &[u8]); 4] = [
            (b"&&", b"ab"),
            (b"*& of &;x", b"zed"),
            (b"plain", b""),
            (b"&", b""),
        ];
        for (gecos, login) in cases {
            assert_eq!(expand(gecos, login).len(), estimate_len(gecos, login));
        }
    }
}
