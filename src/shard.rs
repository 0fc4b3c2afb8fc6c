//! Partitioning of the symbol universe into subscription shards

use crate::universe::Symbol;

/// Default number of symbols per connection
pub const DEFAULT_SHARD_SIZE: usize = 50;

/// An ordered, fixed subset of symbols served by one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Position in the plan, used as the shard id in logs and metrics
    pub id: usize,
    pub symbols: Vec<Symbol>,
}

impl Shard {
    pub fn new(id: usize, symbols: Vec<Symbol>) -> Self {
        Self { id, symbols }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Split `symbols` into consecutive shards of at most `shard_size` symbols.
///
/// Deterministic: the same input always yields the same shards in the same
/// order. A `shard_size` of zero is treated as one.
pub fn partition(symbols: &[Symbol], shard_size: usize) -> Vec<Shard> {
    symbols
        .chunks(shard_size.max(1))
        .enumerate()
        .map(|(id, chunk)| Shard::new(id, chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(n: usize) -> Vec<Symbol> {
        (0..n).map(|i| Symbol::new(format!("SYM{i:03}USDT"))).collect()
    }

    #[test]
    fn test_partition_even() {
        let shards = partition(&symbols(100), 50);
        assert_eq!(shards.len(), 2);
        assert_eq!(shards[0].id, 0);
        assert_eq!(shards[1].id, 1);
        assert!(shards.iter().all(|s| s.len() == 50));
    }

    #[test]
    fn test_partition_remainder_in_last_shard() {
        let shards = partition(&symbols(7), 3);
        let sizes: Vec<usize> = shards.iter().map(Shard::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(shards[2].symbols[0], Symbol::new("SYM006USDT"));
    }

    #[test]
    fn test_partition_empty_universe() {
        assert!(partition(&[], 50).is_empty());
    }

    #[test]
    fn test_partition_zero_size_treated_as_one() {
        let shards = partition(&symbols(3), 0);
        assert_eq!(shards.len(), 3);
    }

    #[test]
    fn test_partition_is_deterministic_and_complete() {
        let input = symbols(123);
        let a = partition(&input, 10);
        let b = partition(&input, 10);
        assert_eq!(a, b);

        let flattened: Vec<Symbol> = a.into_iter().flat_map(|s| s.symbols).collect();
        assert_eq!(flattened, input);
    }
}
