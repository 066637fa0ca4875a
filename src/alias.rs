use uuid::Uuid;

pub const ALIAS_LENGTH: usize = 8;

/// Produces a random 8 character base62 alias.
///
/// The alias is taken from the low-order digits of a v4 UUID, so it carries
/// roughly 47 bits of entropy. Uniqueness is the caller's problem.
#[must_use]
pub fn generate() -> String {
    let encoded = base62::encode(Uuid::new_v4().as_u128());
    let padded = format!("{encoded:0>ALIAS_LENGTH$}");
    padded[padded.len() - ALIAS_LENGTH..].to_owned()
}
