//! RAKE (Rapid Automatic Keyword Extraction) for visit descriptions.
//!
//! Candidate phrases are the runs of words between stop words and
//! punctuation. Each word scores `degree / frequency`, where degree counts
//! the words it co-occurs with in candidate phrases (itself included). A
//! phrase scores the sum of its words. Pure synchronous; no I/O.
//!
//! ```
//! use petindex_core::enrich::KeywordExtractor;
//! use petindex_rake::Rake;
//!
//! let rake = Rake::english();
//! let keywords = rake.extract("Rabies shot and a routine dental cleaning.");
//! assert_eq!(keywords[0], "routine dental cleaning");
//! ```

mod stopwords;

use std::collections::{HashMap, HashSet};

use petindex_core::enrich::KeywordExtractor;

/// A keyword extractor with a fixed stop-word list.
#[derive(Debug, Clone)]
pub struct Rake {
  stop_words: HashSet<String>,
}

impl Default for Rake {
  fn default() -> Self { Self::english() }
}

impl Rake {
  /// An extractor using the built-in English stop-word list.
  pub fn english() -> Self {
    Self {
      stop_words: stopwords::ENGLISH.iter().map(|w| w.to_string()).collect(),
    }
  }

  /// Add stop words on top of the current list. Matching is case-insensitive.
  pub fn with_stop_words<I, S>(mut self, extra: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    self
      .stop_words
      .extend(extra.into_iter().map(|w| w.as_ref().to_lowercase()));
    self
  }

  /// Ranked phrases with their scores, best first. Ties keep the order of
  /// first appearance.
  pub fn score(&self, text: &str) -> Vec<(String, f64)> {
    let phrases = self.candidates(text);

    let mut frequency: HashMap<&str, f64> = HashMap::new();
    let mut degree: HashMap<&str, f64> = HashMap::new();
    for phrase in &phrases {
      let len = phrase.len() as f64;
      for word in phrase {
        *frequency.entry(word).or_default() += 1.0;
        *degree.entry(word).or_default() += len;
      }
    }

    let mut seen = HashSet::new();
    let mut ranked: Vec<(String, f64)> = phrases
      .iter()
      .filter_map(|phrase| {
        let joined = phrase.join(" ");
        if !seen.insert(joined.clone()) {
          return None;
        }
        let score: f64 = phrase
          .iter()
          .map(|w| degree[w.as_str()] / frequency[w.as_str()])
          .sum();
        Some((joined, score))
      })
      .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
  }

  /// Split `text` into candidate phrases, each a list of lowercase words.
  fn candidates(&self, text: &str) -> Vec<Vec<String>> {
    let lowered = text.to_lowercase();
    let mut phrases = Vec::new();

    for fragment in lowered.split(is_delimiter) {
      let mut current: Vec<String> = Vec::new();
      for raw in fragment.split_whitespace() {
        let word = raw.trim_matches(|c: char| c == '\'' || c == '-');
        if word.is_empty() || self.stop_words.contains(word) {
          flush(&mut current, &mut phrases);
        } else {
          current.push(word.to_owned());
        }
      }
      flush(&mut current, &mut phrases);
    }
    phrases
  }
}

/// Phrase boundaries: anything that is not part of a word or whitespace.
fn is_delimiter(c: char) -> bool {
  !(c.is_alphanumeric() || c.is_whitespace() || c == '\'' || c == '-')
}

fn flush(current: &mut Vec<String>, phrases: &mut Vec<Vec<String>>) {
  if current.is_empty() {
    return;
  }
  let phrase = std::mem::take(current);
  if !phrase.iter().all(|w| w.chars().all(|c| c.is_ascii_digit())) {
    phrases.push(phrase);
  }
}

impl KeywordExtractor for Rake {
  fn extract(&self, text: &str) -> Vec<String> {
    self.score(text).into_iter().map(|(phrase, _)| phrase).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_phrase() {
    assert_eq!(Rake::english().extract("rabies shot"), ["rabies shot"]);
  }

  #[test]
  fn stop_words_and_punctuation_split_phrases() {
    let rake = Rake::english();
    let keywords = rake.extract("Spayed, then given a rabies shot; very calm.");
    assert_eq!(keywords, ["rabies shot", "spayed", "given", "calm"]);
  }

  #[test]
  fn longer_phrases_rank_higher() {
    let rake = Rake::english();
    let scored = rake.score("neutered with minor post surgical swelling");
    assert_eq!(scored[0].0, "minor post surgical swelling");
    assert_eq!(scored[0].1, 16.0);
    assert_eq!(scored[1], ("neutered".to_owned(), 1.0));
  }

  #[test]
  fn repeated_phrases_appear_once() {
    let rake = Rake::english();
    let keywords = rake.extract("checkup. checkup. checkup and shots");
    assert_eq!(keywords, ["checkup", "shots"]);
  }

  #[test]
  fn numeric_only_phrases_are_dropped() {
    let rake = Rake::english();
    assert_eq!(rake.extract("weight 12 , 2010"), ["weight 12"]);
    assert!(rake.extract("2010").is_empty());
    assert!(rake.extract("").is_empty());
  }

  #[test]
  fn extra_stop_words() {
    let rake = Rake::english().with_stop_words(["Routine"]);
    assert_eq!(rake.extract("routine checkup"), ["checkup"]);
  }
}
