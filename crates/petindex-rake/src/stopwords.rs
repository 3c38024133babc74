//! English stop words. Candidate phrases are split wherever one occurs.

pub const ENGLISH: &[&str] = &[
  "a", "about", "above", "after", "again", "against", "all", "also", "am",
  "an", "and", "any", "are", "as", "at", "be", "because", "been", "before",
  "being", "below", "between", "both", "but", "by", "can", "could", "did",
  "do", "does", "doing", "done", "down", "during", "each", "either", "else",
  "etc", "ever", "every", "few", "for", "from", "further", "get", "got", "had",
  "has", "have", "having", "he", "her", "here", "hers", "herself", "him",
  "himself", "his", "how", "however", "i", "if", "in", "into", "is", "it",
  "its", "itself", "just", "least", "less", "may", "me", "might", "more",
  "most", "much", "must", "my", "myself", "neither", "no", "nor", "not", "now",
  "of", "off", "on", "once", "only", "or", "other", "ought", "our", "ours",
  "ourselves", "out", "over", "own", "per", "same", "shall", "she", "should",
  "since", "so", "some", "such", "than", "that", "the", "their", "theirs",
  "them", "themselves", "then", "there", "these", "they", "this", "those",
  "through", "thus", "to", "too", "under", "until", "up", "upon", "us", "very",
  "via", "was", "we", "were", "what", "when", "where", "whether", "which",
  "while", "who", "whom", "whose", "why", "will", "with", "within", "without",
  "would", "yet", "you", "your", "yours", "yourself", "yourselves",
];
