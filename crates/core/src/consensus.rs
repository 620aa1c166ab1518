use crate::vote::QueryResult;

/// The single category every neighbor agrees on, or `None` when the vote is
/// split in any proportion. Distances play no part here.
pub fn unanimous_vote(result: &QueryResult) -> Option<&str> {
    match result.distinct_categories().as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::RawNeighbors;

    fn result(categories: &[&str]) -> QueryResult {
        let raw = RawNeighbors {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            distances: (0..categories.len()).map(|i| i as f64 * 0.1).collect(),
            ids: (0..categories.len()).map(|i| format!("id{}", i)).collect(),
        };
        QueryResult::from_raw("snippet", raw).unwrap()
    }

    #[test]
    fn unanimous_neighbors_decide() {
        assert_eq!(unanimous_vote(&result(&["RSA", "RSA", "RSA", "RSA"])), Some("RSA"));
        assert_eq!(unanimous_vote(&result(&["MD5"])), Some("MD5"));
    }

    #[test]
    fn any_split_defers() {
        assert_eq!(unanimous_vote(&result(&["RSA", "RSA", "RSA", "AES"])), None);
        assert_eq!(unanimous_vote(&result(&["RSA", "RSA", "AES", "AES"])), None);
        assert_eq!(unanimous_vote(&result(&["RSA", "AES", "DES", "HMAC"])), None);
    }
}
