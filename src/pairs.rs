use std::collections::HashSet;

/// One gene pair row, as produced by [`generate_pairs`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenePair {
    pub gene1: String,
    pub gene2: String,
}

impl GenePair {
    fn new(gene1: &str, gene2: &str) -> Self {
        Self {
            gene1: gene1.to_string(),
            gene2: gene2.to_string(),
        }
    }
}

/// Generate gene pairs from a module (a list of gene names).
///
/// With `save_order`, both (A,B) and (B,A) are produced; otherwise only the
/// unordered combinations. Self-pairs are never produced. Unless
/// `duplicate_pairs` is set, repeated rows are dropped, keeping first
/// occurrence order.
pub fn generate_pairs(module: &[String], save_order: bool, duplicate_pairs: bool) -> Vec<GenePair> {
    let mut pairs = Vec::new();
    if save_order {
        for a in module {
            for b in module {
                if a != b {
                    pairs.push(GenePair::new(a, b));
                }
            }
        }
    } else {
        for (i, a) in module.iter().enumerate() {
            for b in &module[i + 1..] {
                pairs.push(GenePair::new(a, b));
            }
        }
    }

    if !duplicate_pairs {
        let mut seen = HashSet::new();
        pairs.retain(|pair| seen.insert(pair.clone()));
    }
    pairs
}
