/// Fresh 128-bit, lowercase hex-encoded trace id (§4.8 step 1).
pub fn generate_trace_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Fresh 64-bit, lowercase hex-encoded span id (§4.8 step 2).
pub fn generate_span_id() -> String {
    format!("{:016x}", rand::random::<u64>())
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_id_is_32_lowercase_hex_chars() {
        let id = generate_trace_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn span_id_is_16_lowercase_hex_chars() {
        let id = generate_span_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn round2_matches_documented_example() {
        assert_eq!(round2(12.3456), 12.35);
    }
}
