//! Slug generation: a readable prefix from the title plus a random suffix.

use rand::Rng;

/// Default width of the random base-36 suffix.
pub const DEFAULT_SUFFIX_LEN: usize = 8;

// 36^12 still fits in a u64.
const MAX_SUFFIX_LEN: usize = 12;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates `<slugified-title>-<suffix>` identifiers.
///
/// Uniqueness is probabilistic only; callers must still handle a storage
/// uniqueness violation.
#[derive(Debug, Clone, Copy)]
pub struct SlugGenerator {
    suffix_len: usize,
}

impl Default for SlugGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SUFFIX_LEN)
    }
}

impl SlugGenerator {
    pub fn new(suffix_len: usize) -> Self {
        Self {
            suffix_len: suffix_len.clamp(1, MAX_SUFFIX_LEN),
        }
    }

    pub fn generate(&self, title: &str) -> String {
        let base = slugify(title);
        let suffix = self.suffix(&mut rand::thread_rng());
        if base.is_empty() {
            suffix
        } else {
            format!("{base}-{suffix}")
        }
    }

    fn suffix<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let range = 36u64.pow(self.suffix_len as u32);
        to_base36(rng.gen_range(0..range), self.suffix_len)
    }
}

/// Lowercase, hyphen-separated ASCII transliteration of `title`.
///
/// Apostrophes are dropped rather than treated as word breaks, so
/// "Don't" becomes "dont".
pub fn slugify(title: &str) -> String {
    let joined: String = title
        .chars()
        .filter(|&ch| ch != '\'' && ch != '\u{2019}')
        .collect();
    ::slug::slugify(joined)
}

fn to_base36(mut n: u64, width: usize) -> String {
    let mut digits = vec!['0'; width];
    for slot in digits.iter_mut().rev() {
        *slot = BASE36[(n % 36) as usize] as char;
        n /= 36;
    }
    digits.into_iter().collect()
}
