//! TF-IDF 用のトークナイズ（語と n-gram の生成）。
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("compile word pattern"));

fn normalize_text(input: &str) -> String {
    input.nfc().collect::<String>().to_lowercase()
}

/// 2文字以上の語に分割する。
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    WORD_RE
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `min_n..=max_n` の語 n-gram を、n の小さい順・出現順に並べて返す。
#[must_use]
pub fn ngrams(text: &str, min_n: usize, max_n: usize) -> Vec<String> {
    let words = words(text);
    let min_n = min_n.max(1);
    let mut grams = Vec::new();
    for n in min_n..=max_n.min(words.len()) {
        if n == 1 {
            grams.extend(words.iter().cloned());
        } else {
            grams.extend(words.windows(n).map(|window| window.join(" ")));
        }
    }
    grams
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_drop_single_characters_and_punctuation() {
        assert_eq!(
            words("A Deep-Learning model, v2!"),
            vec!["deep", "learning", "model", "v2"]
        );
    }

    #[test]
    fn ngrams_include_bigrams_after_unigrams() {
        assert_eq!(
            ngrams("graph neural nets", 1, 2),
            vec![
                "graph",
                "neural",
                "nets",
                "graph neural",
                "neural nets"
            ]
        );
    }

    #[test]
    fn ngrams_of_short_text_are_truncated() {
        assert_eq!(ngrams("solo", 1, 3), vec!["solo"]);
        assert!(ngrams("", 1, 2).is_empty());
    }
}
