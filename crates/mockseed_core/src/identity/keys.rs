//! Bounded regeneration of natural keys.
//!
//! On collision the natural key is regenerated, never the identifier.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Every candidate produced within the bound collided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyAttemptsExhausted {
    pub attempts: u32,
}

impl Display for KeyAttemptsExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "no free natural key after {} attempts", self.attempts)
    }
}

impl Error for KeyAttemptsExhausted {}

/// Draws candidates from `propose` until `is_taken` rejects none of them.
///
/// At most `limit` candidates are drawn; a `limit` of zero draws one.
pub fn unique_key<T, P, C>(limit: u32, mut propose: P, mut is_taken: C) -> Result<T, KeyAttemptsExhausted>
where
    P: FnMut() -> T,
    C: FnMut(&T) -> bool,
{
    let limit = limit.max(1);
    for _ in 0..limit {
        let candidate = propose();
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }
    Err(KeyAttemptsExhausted { attempts: limit })
}

#[cfg(test)]
mod tests {
    use super::unique_key;
    use std::collections::HashSet;

    #[test]
    fn returns_first_free_candidate() {
        let taken: HashSet<&str> = ["a", "b"].into_iter().collect();
        let mut pool = ["a", "b", "c", "d"].into_iter();
        let key = unique_key(10, || pool.next().unwrap_or("z"), |k| taken.contains(k)).unwrap();
        assert_eq!(key, "c");
    }

    #[test]
    fn gives_up_after_limit() {
        let mut calls = 0;
        let err = unique_key(
            5,
            || {
                calls += 1;
                "same"
            },
            |_| true,
        )
        .unwrap_err();
        assert_eq!(err.attempts, 5);
        assert_eq!(calls, 5);
    }
}
