use crate::integrity::error::{IntegrityError, IntegrityResult};
use crate::integrity::types::VerificationResult;
use crate::model::Checksum;
use blake3::Hasher;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tokio::io::AsyncReadExt;

pub struct IntegrityVerifier;

impl IntegrityVerifier {
    pub fn calculate_checksum(data: &[u8]) -> [u8; 32] {
        let mut hasher = Hasher::new();
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Streams the file through BLAKE3 rather than reading it whole, so a
    /// large file being verified does not double its own size in memory.
    pub async fn calculate_file_checksum(path: &Path) -> IntegrityResult<[u8; 32]> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IntegrityError::Io(path.display().to_string(), e))?;

        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            let n = file
                .read(&mut buffer)
                .await
                .map_err(|e| IntegrityError::Io(path.display().to_string(), e))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(*hasher.finalize().as_bytes())
    }

    pub fn verify(data: &[u8], expected: &Checksum) -> IntegrityResult<()> {
        let actual = Self::calculate_checksum(data);
        if actual != expected.bytes {
            return Err(IntegrityError::ChecksumMismatch {
                expected: expected.bytes,
                actual,
            });
        }
        Ok(())
    }

    pub fn verify_detailed(data: &[u8], expected: &Checksum, now: i64) -> VerificationResult {
        let actual = Self::calculate_checksum(data);
        VerificationResult::new(expected.bytes, actual, now)
    }

    /// Verifies a batch of `(data, expected)` pairs concurrently, bounded by
    /// the number of available CPUs.
    pub async fn verify_batch<'a>(
        items: &'a [(&'a [u8], &'a Checksum)],
    ) -> Vec<IntegrityResult<()>> {
        stream::iter(items)
            .map(|(data, expected)| async move { Self::verify(data, expected) })
            .buffer_unordered(num_cpus::get())
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Checksum;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn same_data_produces_same_checksum() {
        let a = IntegrityVerifier::calculate_checksum(b"hello");
        let b = IntegrityVerifier::calculate_checksum(b"hello");
        assert_eq!(a, b);
        let c = IntegrityVerifier::calculate_checksum(b"world");
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn file_checksum_matches_in_memory_checksum() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.bin");
        let data = b"streamed checksum content";
        let mut file = tokio::fs::File::create(&path).await.unwrap();
        file.write_all(data).await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let from_file = IntegrityVerifier::calculate_file_checksum(&path).await.unwrap();
        assert_eq!(from_file, IntegrityVerifier::calculate_checksum(data));
    }

    #[test]
    fn verify_rejects_mismatched_checksum() {
        let data = b"payload";
        let wrong = Checksum::blake3([0u8; 32]);
        let err = IntegrityVerifier::verify(data, &wrong).unwrap_err();
        assert!(matches!(err, IntegrityError::ChecksumMismatch { .. }));
    }

    #[test]
    fn verify_accepts_matching_checksum() {
        let data = b"payload";
        let checksum = Checksum::blake3(IntegrityVerifier::calculate_checksum(data));
        assert!(IntegrityVerifier::verify(data, &checksum).is_ok());
    }

    #[tokio::test]
    async fn verify_batch_reports_per_item_results() {
        let good = Checksum::blake3(IntegrityVerifier::calculate_checksum(b"a"));
        let bad = Checksum::blake3([0u8; 32]);
        let items: Vec<(&[u8], &Checksum)> = vec![(b"a", &good), (b"a", &bad)];
        let results = IntegrityVerifier::verify_batch(&items).await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    }
}
