use serde::{Deserialize, Serialize};

/// Outcome of comparing a freshly computed checksum against an expected one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub success: bool,
    pub expected: [u8; 32],
    pub actual: [u8; 32],
    pub verified_at: i64,
}

impl VerificationResult {
    pub fn new(expected: [u8; 32], actual: [u8; 32], verified_at: i64) -> Self {
        Self {
            success: expected == actual,
            expected,
            actual,
            verified_at,
        }
    }
}
