//! Approximate name matching.
//!
//! Two strain names are compared on their normalized token sequences:
//! lower-cased, split on every run of non-alphanumeric characters. A query
//! matches a candidate when
//!
//! * the joined query is a substring of the joined candidate
//!   (`nam 1194` inside `a vietnam 1194 2004 nibrg 14`), or
//! * every query token can be paired, in order, with a candidate token,
//!   skipping candidate tokens freely. Up to three neighbouring tokens on
//!   either side may be glued together first, so `HONGKONG` pairs with
//!   `HONG-KONG` and vice versa. Glued runs must be equal.
//!
//! Single tokens match when they are equal. Purely alphabetic tokens of at
//! least `min_fuzzy_len` characters additionally match when contained in the
//! candidate token (truncation) or within `max(1, len * max_typo_ratio)`
//! optimal-string-alignment edits of it. Tokens containing digits are read
//! with letter look-alikes folded (`2OO4` is `2004`) and, from
//! `min_fuzzy_len` characters on, tolerate one swap of neighbouring
//! characters (`1149` pairs with `1194`). Other digit edits are distinct
//! strains, so `2004` does not pair with `2005`.
//!
//! Point mutations (`K153E`) present in either name must agree as sets unless
//! the config says to ignore them.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::search::SearchConfig;

/// Most tokens that may be glued together when pairing.
const MAX_GLUE: usize = 3;

static MUTATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ARNDCEQGHILKMFPSTWYV]\d{2,3}[ARNDCEQGHILKMFPSTWYV]$")
        .expect("mutation pattern is valid")
});

/// A pre-normalized name, cheap to compare many times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
    tokens: Vec<String>,
    joined: String,
    mutations: BTreeSet<String>,
}

impl NameKey {
    pub fn new(name: &str) -> Self {
        let tokens = normalize(name);
        let joined = tokens.join(" ");
        let mutations = tokens
            .iter()
            .map(|t| t.to_ascii_uppercase())
            .filter(|t| MUTATION.is_match(t))
            .collect();
        NameKey {
            tokens,
            joined,
            mutations,
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn mutations(&self) -> &BTreeSet<String> {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Lower-case `name` and split it on runs of non-alphanumeric characters.
pub fn normalize(name: &str) -> Vec<String> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Whether `query` approximately names `candidate`.
pub fn names_match(query: &str, candidate: &str, config: &SearchConfig) -> bool {
    keys_match(&NameKey::new(query), &NameKey::new(candidate), config)
}

/// [`names_match`] over pre-normalized keys.
pub fn keys_match(query: &NameKey, candidate: &NameKey, config: &SearchConfig) -> bool {
    if query.is_empty() {
        return false;
    }
    if !config.ignore_mutations && query.mutations != candidate.mutations {
        return false;
    }
    if candidate.joined.contains(&query.joined) {
        return true;
    }
    tokens_match(&query.tokens, &candidate.tokens, config)
}

/// Ordered pairing of query tokens onto candidate tokens.
///
/// `reach[i][j]` holds when the first `i` query tokens are consumed by the
/// first `j` candidate tokens.
fn tokens_match(query: &[String], candidate: &[String], config: &SearchConfig) -> bool {
    let (nq, nc) = (query.len(), candidate.len());
    let mut reach = vec![vec![false; nc + 1]; nq + 1];
    reach[0][0] = true;

    for i in 0..=nq {
        for j in 0..=nc {
            if !reach[i][j] {
                continue;
            }
            if i == nq {
                return true;
            }
            if j == nc {
                continue;
            }
            reach[i][j + 1] = true;

            for a in 1..=MAX_GLUE.min(nq - i) {
                let q = query[i..i + a].concat();
                for b in 1..=MAX_GLUE.min(nc - j) {
                    let c = candidate[j..j + b].concat();
                    let paired = if a == 1 && b == 1 {
                        token_match(&q, &c, config)
                    } else {
                        q == c
                    };
                    if paired {
                        reach[i + a][j + b] = true;
                    }
                }
            }
        }
    }
    false
}

fn token_match(query: &str, candidate: &str, config: &SearchConfig) -> bool {
    if query == candidate {
        return true;
    }
    let len = query.chars().count();
    if query.chars().any(|c| c.is_ascii_digit()) {
        return numeric_token_match(query, candidate, len >= config.min_fuzzy_len);
    }
    if len < config.min_fuzzy_len || !query.chars().all(char::is_alphabetic) {
        return false;
    }
    if candidate.contains(query) {
        return true;
    }
    let budget = ((len as f64 * config.max_typo_ratio).floor() as usize).max(1);
    strsim::osa_distance(query, candidate) <= budget
}

/// Digit-bearing tokens: equal after folding look-alikes, or one adjacent
/// transposition apart when `allow_swap` is set.
fn numeric_token_match(query: &str, candidate: &str, allow_swap: bool) -> bool {
    let (query, candidate) = (fold_digits(query), fold_digits(candidate));
    if query == candidate {
        return true;
    }
    if !allow_swap || strsim::osa_distance(&query, &candidate) != 1 {
        return false;
    }
    // One edit with the same characters can only be a transposition.
    let mut q: Vec<char> = query.chars().collect();
    let mut c: Vec<char> = candidate.chars().collect();
    q.sort_unstable();
    c.sort_unstable();
    q == c
}

fn fold_digits(token: &str) -> String {
    if !token.chars().any(|c| c.is_ascii_digit()) {
        return token.to_string();
    }
    token
        .chars()
        .map(|c| match c {
            'o' => '0',
            'i' | 'l' => '1',
            other => other,
        })
        .collect()
}
