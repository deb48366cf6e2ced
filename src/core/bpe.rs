//! Rank-ordered byte pair merging for a single word.
//!
//! The word is a sequence of vocabulary IDs. On every pass the adjacent pair
//! with the lowest rank anywhere in the word is selected, and every
//! non-overlapping occurrence of that pair is merged, scanning left to right.
//! Merging stops when one symbol remains or no adjacent pair has a rank.
//!
//! Selection is global, not leftmost: a low-rank pair at the end of the word
//! merges before a higher-rank pair at its start.

use super::vocab::{MergeRanks, MergeRule};

/// Find the adjacent pair with the lowest rank.
///
/// Returns the pair's symbols and its merge rule.
#[inline]
fn lowest_ranked_pair(word: &[u32], ranks: &MergeRanks) -> Option<(u32, u32, MergeRule)> {
    word.windows(2)
        .filter_map(|pair| {
            ranks
                .get(pair[0], pair[1])
                .map(|rule| (pair[0], pair[1], rule))
        })
        .min_by_key(|&(_, _, rule)| rule.rank)
}

/// Apply merges to `word` in place until no ranked pair remains.
pub fn byte_pair_merge(word: &mut Vec<u32>, ranks: &MergeRanks) {
    while word.len() > 1 {
        let Some((first, second, rule)) = lowest_ranked_pair(word, ranks) else {
            break;
        };

        let mut write = 0;
        let mut read = 0;
        while read < word.len() {
            if read + 1 < word.len() && word[read] == first && word[read + 1] == second {
                word[write] = rule.merged;
                read += 2;
            } else {
                word[write] = word[read];
                read += 1;
            }
            write += 1;
        }
        word.truncate(write);
    }
}
