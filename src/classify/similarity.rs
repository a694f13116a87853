use serde::{Deserialize, Serialize};

/// Decides whether a free-text sample name belongs to a bucket.
///
/// `matches` is used against certified-reference names, `matches_stem`
/// against the seed name of a generic replicate set.
pub trait NameSimilarity {
    fn matches(&self, candidate: &str, reference: &str) -> bool;

    /// Default: compare against the first whitespace token of `reference`.
    fn matches_stem(&self, candidate: &str, reference: &str) -> bool {
        match first_token(reference) {
            Some(stem) => self.matches(candidate, stem),
            None => false,
        }
    }
}

/// First whitespace-delimited token, if any.
pub fn first_token(name: &str) -> Option<&str> {
    name.split_whitespace().next()
}

// ---------------------------------------------------------------------------
// Containment
// ---------------------------------------------------------------------------

/// Case-sensitive substring containment.
///
/// Cheap and predictable, but brittle: "B Soil" will not match "Soil B".
#[derive(Debug, Clone, Copy, Default)]
pub struct Containment;

impl NameSimilarity for Containment {
    fn matches(&self, candidate: &str, reference: &str) -> bool {
        !reference.is_empty() && candidate.contains(reference)
    }
}

// ---------------------------------------------------------------------------
// Edit distance
// ---------------------------------------------------------------------------

/// Levenshtein distance against the whole reference name.
#[derive(Debug, Clone, Copy)]
pub struct EditDistance {
    pub max_distance: usize,
}

impl Default for EditDistance {
    fn default() -> Self {
        Self {
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl NameSimilarity for EditDistance {
    fn matches(&self, candidate: &str, reference: &str) -> bool {
        !reference.is_empty() && levenshtein(candidate, reference) <= self.max_distance
    }

    fn matches_stem(&self, candidate: &str, reference: &str) -> bool {
        self.matches(candidate, reference)
    }
}

pub const DEFAULT_MAX_DISTANCE: usize = 3;

/// Classic dynamic-programming edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a_len][b_len]
}

// ---------------------------------------------------------------------------
// MatchStrategy – configuration-facing selector
// ---------------------------------------------------------------------------

/// Which [`NameSimilarity`] the classifier should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MatchStrategy {
    #[default]
    Containment,
    EditDistance {
        #[serde(default = "default_max_distance")]
        max_distance: usize,
    },
}

fn default_max_distance() -> usize {
    DEFAULT_MAX_DISTANCE
}

impl MatchStrategy {
    pub fn build(&self) -> Box<dyn NameSimilarity> {
        match *self {
            MatchStrategy::Containment => Box::new(Containment),
            MatchStrategy::EditDistance { max_distance } => Box::new(EditDistance { max_distance }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_is_case_sensitive() {
        assert!(Containment.matches("Soil B run 2", "Soil B"));
        assert!(!Containment.matches("soil b run 2", "Soil B"));
        assert!(!Containment.matches("B Soil", "Soil B"));
    }

    #[test]
    fn containment_stem_uses_first_token() {
        assert!(Containment.matches_stem("River dup", "River 1"));
        assert!(!Containment.matches_stem("Lake 1", "River 1"));
        assert!(!Containment.matches_stem("anything", "   "));
    }

    #[test]
    fn levenshtein_known_values() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("TMDW", "TMDW"), 0);
    }

    #[test]
    fn edit_distance_tolerates_small_suffixes() {
        let m = EditDistance::default();
        assert!(m.matches("Soil B2", "Soil B"));
        assert!(m.matches_stem("River 12", "River 1"));
        assert!(!m.matches("Soil B run 2", "Soil B"));
    }

    #[test]
    fn strategy_from_json() {
        let s: MatchStrategy =
            serde_json::from_str(r#"{"strategy": "edit_distance", "max_distance": 2}"#).unwrap();
        assert_eq!(s, MatchStrategy::EditDistance { max_distance: 2 });

        let s: MatchStrategy = serde_json::from_str(r#"{"strategy": "edit_distance"}"#).unwrap();
        assert_eq!(s, MatchStrategy::EditDistance { max_distance: 3 });

        let s: MatchStrategy = serde_json::from_str(r#"{"strategy": "containment"}"#).unwrap();
        assert!(s.build().matches("CCV 1", "CCV"));
    }
}
