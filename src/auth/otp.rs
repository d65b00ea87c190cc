use rand::Rng;

/// Six-digit numeric code, zero padded.
pub fn generate_reset_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}
