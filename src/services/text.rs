//! Language-aware text normalization and TF-IDF vectorization.
//!
//! Uzbek text is folded to Latin script with a single apostrophe form so that
//! "o‘zbek", "oʻzbek" and "ўзбек" all produce the same token. Russian text keeps
//! its Cyrillic script with `ё` folded to `е`. Both languages drop stop words
//! and single-character tokens.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::TrainingError;
use crate::models::Language;
use crate::services::similarity::SparseVector;

const UZ_STOP_WORDS: &[&str] = &[
    "va", "bilan", "uchun", "bu", "ham", "lekin", "yoki", "da", "ga", "dan", "ning", "bir",
    "eng", "juda", "har", "shu", "ular", "biz", "siz", "men", "edi", "emas", "kabi", "deb",
];

const RU_STOP_WORDS: &[&str] = &[
    "и", "в", "во", "не", "что", "он", "на", "с", "со", "как", "а", "то", "все", "она", "так",
    "его", "но", "да", "ты", "к", "у", "же", "вы", "за", "бы", "по", "только", "ее", "мне",
    "было", "вот", "от", "меня", "еще", "нет", "о", "из", "ему", "для", "это", "при", "или",
];

/// Normalizes free text into space-separated tokens
pub fn normalize(text: &str, language: Language) -> String {
    let folded: String = match language {
        Language::Uz => text.chars().flat_map(fold_uzbek).collect(),
        Language::Ru => text
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| match c {
                'ё' => 'е',
                c => fold_apostrophe(c),
            })
            .collect(),
    };

    let stop_words = stop_words(language);
    folded
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| token.chars().count() >= 2 && !stop_words.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn stop_words(language: Language) -> HashSet<&'static str> {
    match language {
        Language::Uz => UZ_STOP_WORDS.iter().copied().collect(),
        Language::Ru => RU_STOP_WORDS.iter().copied().collect(),
    }
}

fn fold_apostrophe(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{02BB}' | '\u{02BC}' | '`' | '\u{00B4}' => '\'',
        c => c,
    }
}

/// Lowercases and transliterates one Uzbek character to Latin script
fn fold_uzbek(c: char) -> Vec<char> {
    let lower = c.to_lowercase().next().unwrap_or(c);
    let latin: &str = match lower {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'э' => "e",
        'ё' => "yo",
        'ж' => "j",
        'з' => "z",
        'и' => "i",
        'й' => "y",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "x",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'ъ' => "'",
        'ь' => "",
        'ю' => "yu",
        'я' => "ya",
        'ў' => "o'",
        'қ' => "q",
        'ғ' => "g'",
        'ҳ' => "h",
        other => return vec![fold_apostrophe(other)],
    };
    latin.chars().collect()
}

/// Bag-of-n-grams TF-IDF vectorizer with document-frequency pruning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    ngram_range: (usize, usize),
    max_features: usize,
    min_df: usize,
    max_df: f64,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TfidfVectorizer {
    /// Unigrams and bigrams, at most 5000 terms, terms in fewer than 2 or more
    /// than 80% of documents dropped
    pub fn new() -> Self {
        Self {
            ngram_range: (1, 2),
            max_features: 5000,
            min_df: 2,
            max_df: 0.8,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn with_ngram_range(mut self, min_n: usize, max_n: usize) -> Self {
        let min_n = min_n.max(1);
        self.ngram_range = (min_n, max_n.max(min_n));
        self
    }

    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_min_df(mut self, min_df: usize) -> Self {
        self.min_df = min_df;
        self
    }

    pub fn with_max_df(mut self, max_df: f64) -> Self {
        self.max_df = max_df.clamp(0.0, 1.0);
        self
    }

    /// Every vocabulary term needs an IDF weight
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.ngram_range.0 == 0 || self.ngram_range.0 > self.ngram_range.1 {
            return Err(TrainingError::InconsistentArtifact(format!(
                "n-gram range {:?}",
                self.ngram_range
            )));
        }
        if self.idf.len() != self.vocabulary.len()
            || self.vocabulary.values().any(|&index| index >= self.idf.len())
        {
            return Err(TrainingError::InconsistentArtifact(format!(
                "{} vocabulary terms but {} IDF weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }
        Ok(())
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// Learns vocabulary and inverse document frequencies from normalized documents
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<(), TrainingError> {
        if documents.is_empty() {
            return Err(TrainingError::EmptyCorpus);
        }

        let n_docs = documents.len();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let grams = self.ngrams(doc.as_ref());
            let mut seen = HashSet::new();
            for gram in grams {
                *term_freq.entry(gram.clone()).or_insert(0) += 1;
                if seen.insert(gram.clone()) {
                    *doc_freq.entry(gram).or_insert(0) += 1;
                }
            }
        }

        let max_doc_count = self.max_df * n_docs as f64;
        let mut kept: Vec<(String, usize)> = doc_freq
            .iter()
            .filter(|(_, &df)| df >= self.min_df && df as f64 <= max_doc_count)
            .map(|(term, _)| (term.clone(), term_freq[term]))
            .collect();

        if kept.len() > self.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(self.max_features);
        }
        kept.sort_by(|a, b| a.0.cmp(&b.0));

        if kept.is_empty() {
            return Err(TrainingError::EmptyVocabulary);
        }

        let n = n_docs as f64;
        self.idf = kept
            .iter()
            .map(|(term, _)| ((1.0 + n) / (1.0 + doc_freq[term] as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(index, (term, _))| (term, index))
            .collect();

        Ok(())
    }

    /// L2-normalized TF-IDF row. Terms outside the vocabulary are dropped.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for gram in self.ngrams(document) {
            if let Some(&index) = self.vocabulary.get(&gram) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        SparseVector::from_sorted(
            counts
                .into_iter()
                .map(|(index, count)| (index, count * self.idf[index])),
        )
        .normalized()
    }

    pub fn fit_transform<S: AsRef<str>>(
        &mut self,
        documents: &[S],
    ) -> Result<Vec<SparseVector>, TrainingError> {
        self.fit(documents)?;
        Ok(documents.iter().map(|d| self.transform(d.as_ref())).collect())
    }

    fn ngrams(&self, document: &str) -> Vec<String> {
        let tokens: Vec<&str> = document.split_whitespace().collect();
        let (min_n, max_n) = self.ngram_range;
        let mut grams = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            grams.extend(tokens.windows(n).map(|window| window.join(" ")));
        }
        grams
    }
}
