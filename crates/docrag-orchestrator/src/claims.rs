//! Filenames owned by an in-flight ingest or delete

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub(crate) struct NameClaims {
    names: Mutex<HashSet<String>>,
}

impl NameClaims {
    fn names(&self) -> MutexGuard<'_, HashSet<String>> {
        self.names.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `filename` for the caller, or `None` while someone else holds it.
    ///
    /// The claim is released when the returned guard is dropped.
    pub(crate) fn try_claim(&self, filename: &str) -> Option<NameClaim<'_>> {
        self.names().insert(filename.to_string()).then(|| NameClaim {
            claims: self,
            filename: filename.to_string(),
        })
    }
}

pub(crate) struct NameClaim<'a> {
    claims: &'a NameClaims,
    filename: String,
}

impl Drop for NameClaim<'_> {
    fn drop(&mut self) {
        self.claims.names().remove(&self.filename);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let claims = NameClaims::default();

        let first = claims.try_claim("a.txt");
        assert!(first.is_some());
        assert!(claims.try_claim("a.txt").is_none());
        assert!(claims.try_claim("b.txt").is_some());

        drop(first);
        assert!(claims.try_claim("a.txt").is_some());
    }
}
