use rand::{Rng, distributions::Alphanumeric};

pub const SHORT_CODE_LENGTH: usize = 6;

/// Random `[A-Za-z0-9]` token of [`SHORT_CODE_LENGTH`] characters.
///
/// Calls are independent; uniqueness is the registry's concern.
pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LENGTH)
        .map(char::from)
        .collect()
}
