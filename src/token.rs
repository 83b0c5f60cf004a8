use rand::rngs::OsRng;
use rand::RngCore;

// 16 bytes keeps accidental collisions out of the realm of the practical;
// the registry still retries if one ever happens.
const TOKEN_BYTES: usize = 16;

/// Generate an opaque hex session token from the OS entropy source.
///
/// An entropy failure is surfaced to the caller; it fails that login only.
pub fn generate() -> Result<String, rand::Error> {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.try_fill_bytes(&mut buf)?;
    Ok(buf.iter().map(|b| format!("{b:02x}")).collect())
}
