//! Keyword enrichment of visit descriptions.
//!
//! The extractor is an explicit collaborator handed to [`enrich`]; there is no
//! shared or global instance.

use crate::event::{ChangeEvent, VisitRow};

/// Number of keywords attached to a visit unless configured otherwise.
pub const DEFAULT_KEYWORD_LIMIT: usize = 5;

/// Extracts ranked keywords from free text, best first.
pub trait KeywordExtractor: Send + Sync {
  fn extract(&self, text: &str) -> Vec<String>;
}

impl<F> KeywordExtractor for F
where
  F: Fn(&str) -> Vec<String> + Send + Sync,
{
  fn extract(&self, text: &str) -> Vec<String> { self(text) }
}

/// Attach at most `limit` keywords extracted from the visit description.
pub fn enrich<K: KeywordExtractor + ?Sized>(
  mut visit: VisitRow,
  extractor: &K,
  limit: usize,
) -> VisitRow {
  let mut keywords = extractor.extract(&visit.description);
  keywords.truncate(limit);
  visit.keywords = keywords;
  visit
}

/// Enrich `event` if it is a visit; other events pass through untouched.
pub fn enrich_event<K: KeywordExtractor + ?Sized>(
  event: ChangeEvent,
  extractor: &K,
  limit: usize,
) -> ChangeEvent {
  match event {
    ChangeEvent::Visit(visit) => {
      ChangeEvent::Visit(enrich(visit, extractor, limit))
    }
    other => other,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::OwnerRow;

  fn words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
  }

  #[test]
  fn keywords_are_truncated_to_limit() {
    let visit = VisitRow {
      pet_id:      7,
      description: "a b c d e f g".into(),
      keywords:    vec![],
    };
    let out = enrich(visit, &words, DEFAULT_KEYWORD_LIMIT);
    assert_eq!(out.keywords, ["a", "b", "c", "d", "e"]);
  }

  #[test]
  fn non_visit_events_pass_through() {
    let event = ChangeEvent::Owner(OwnerRow {
      id:         6,
      first_name: "Jean".into(),
      last_name:  "Coleman".into(),
    });
    assert_eq!(enrich_event(event.clone(), &words, 5), event);
  }

  #[test]
  fn existing_keywords_are_replaced() {
    let visit = VisitRow {
      pet_id:      7,
      description: "rabies shot".into(),
      keywords:    vec!["stale".into()],
    };
    let out = enrich(visit, &words, 1);
    assert_eq!(out.keywords, ["rabies"]);
  }
}
