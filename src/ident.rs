use rand::Rng;
use rand::seq::IndexedRandom;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Length of event and user identifiers.
pub const IDENT_LEN: usize = 24;

/// Random identifier of exactly `len` ASCII letters (`A-Z`, `a-z`).
///
/// Not suitable for anything security related; collisions are tolerated.
pub fn random_ident<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .filter_map(|_| LETTERS.choose(&mut *rng).copied().map(char::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn ident_has_requested_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0, 1, 5, IDENT_LEN, 100] {
            assert_eq!(random_ident(&mut rng, len).len(), len);
        }
    }

    #[test]
    fn ident_is_letters_only() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let id = random_ident(&mut rng, IDENT_LEN);
            assert!(id.chars().all(|c| c.is_ascii_alphabetic()), "bad ident {id}");
        }
    }

    #[test]
    fn ident_uses_both_cases() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = random_ident(&mut rng, 2_000);
        assert!(id.chars().any(|c| c.is_ascii_uppercase()));
        assert!(id.chars().any(|c| c.is_ascii_lowercase()));
    }
}
