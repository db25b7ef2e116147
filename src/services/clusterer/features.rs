//! Feature extraction: TF-IDF, topic model, entities, time proximity.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use crate::utils::text::{capitalized_tokens, cjk_ngrams, digit_runs, has_latin, tokenize};

/// English stopwords applied by the vectorizers (sklearn-style `english`).
const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
    "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
    "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
    "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no",
    "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over",
    "own", "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "them",
    "then", "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
    "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom",
    "why", "will", "with", "you", "your",
];

fn is_stop_word(token: &str) -> bool {
    ENGLISH_STOP_WORDS.contains(&token)
}

/// Term-count vectorizer with a frequency-capped vocabulary, re-fit per call.
pub struct CountVectorizer {
    max_features: usize,
}

impl CountVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    /// Build the vocabulary from the corpus and return raw count rows.
    pub fn fit_transform(&self, documents: &[String]) -> Array2<f64> {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| tokenize(doc).into_iter().filter(|t| !is_stop_word(t)).collect())
            .collect();

        let vocabulary = build_vocabulary(&tokenized, self.max_features);
        counts_matrix(&tokenized, &vocabulary)
    }
}

/// TF-IDF vectorizer producing l2-normalized rows (smooth idf).
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    pub fn fit_transform(&self, documents: &[String]) -> Array2<f64> {
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| tokenize(doc).into_iter().filter(|t| !is_stop_word(t)).collect())
            .collect();

        let vocabulary = build_vocabulary(&tokenized, self.max_features);
        let mut matrix = counts_matrix(&tokenized, &vocabulary);
        let (n_docs, n_terms) = matrix.dim();
        if n_terms == 0 {
            return matrix;
        }

        // document frequencies -> smooth idf
        let mut df = vec![0usize; n_terms];
        for row in matrix.rows() {
            for (term, &count) in row.iter().enumerate() {
                if count > 0.0 {
                    df[term] += 1;
                }
            }
        }
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n_docs as f64) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        for mut row in matrix.rows_mut() {
            for (term, value) in row.iter_mut().enumerate() {
                *value *= idf[term];
            }
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            }
        }

        matrix
    }
}

fn build_vocabulary(tokenized: &[Vec<String>], max_features: usize) -> HashMap<String, usize> {
    let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
    for tokens in tokenized {
        for token in tokens {
            *corpus_counts.entry(token.as_str()).or_insert(0) += 1;
        }
    }

    // highest corpus frequency first; ties broken lexicographically for
    // deterministic re-fits
    let mut terms: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    terms.truncate(max_features);

    terms
        .into_iter()
        .enumerate()
        .map(|(index, (term, _))| (term.to_string(), index))
        .collect()
}

fn counts_matrix(tokenized: &[Vec<String>], vocabulary: &HashMap<String, usize>) -> Array2<f64> {
    let mut matrix = Array2::zeros((tokenized.len(), vocabulary.len()));
    for (doc, tokens) in tokenized.iter().enumerate() {
        for token in tokens {
            if let Some(&term) = vocabulary.get(token) {
                matrix[[doc, term]] += 1.0;
            }
        }
    }
    matrix
}

/// Pairwise cosine similarity of the rows of `x`. Zero rows similarity 0.
pub fn cosine_similarity_matrix(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let mut sim = Array2::zeros((n, n));

    let norms: Vec<f64> = (0..n)
        .map(|i| x.row(i).iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();

    for i in 0..n {
        for j in i..n {
            let value = if norms[i] > 0.0 && norms[j] > 0.0 {
                x.row(i).dot(&x.row(j)) / (norms[i] * norms[j])
            } else {
                0.0
            };
            sim[[i, j]] = value;
            sim[[j, i]] = value;
        }
    }
    sim
}

/// Collapsed-Gibbs LDA over a count matrix; the fixed seed keeps repeated
/// fits identical for identical corpora.
pub struct LatentDirichletAllocation {
    n_topics: usize,
    iterations: usize,
    seed: u64,
}

impl LatentDirichletAllocation {
    pub fn new(n_topics: usize, seed: u64) -> Self {
        Self { n_topics: n_topics.max(1), iterations: 10, seed }
    }

    /// Returns the document-topic distribution matrix (rows sum to 1).
    pub fn fit_transform(&self, counts: &Array2<f64>) -> Array2<f64> {
        let n_docs = counts.nrows();
        let n_terms = counts.ncols();
        let k = self.n_topics;
        let alpha = 1.0 / k as f64;
        let beta = 1.0 / k as f64;

        // expand the count matrix into per-document token streams
        let docs: Vec<Vec<usize>> = (0..n_docs)
            .map(|d| {
                let mut tokens = Vec::new();
                for term in 0..n_terms {
                    for _ in 0..counts[[d, term]] as usize {
                        tokens.push(term);
                    }
                }
                tokens
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut doc_topic = vec![vec![0f64; k]; n_docs];
        let mut topic_term = vec![vec![0f64; n_terms.max(1)]; k];
        let mut topic_totals = vec![0f64; k];
        let mut assignments: Vec<Vec<usize>> = Vec::with_capacity(n_docs);

        for (d, tokens) in docs.iter().enumerate() {
            let mut doc_assignments = Vec::with_capacity(tokens.len());
            for &term in tokens {
                let topic = rng.gen_range(0..k);
                doc_assignments.push(topic);
                doc_topic[d][topic] += 1.0;
                topic_term[topic][term] += 1.0;
                topic_totals[topic] += 1.0;
            }
            assignments.push(doc_assignments);
        }

        let mut weights = vec![0f64; k];
        for _ in 0..self.iterations {
            for (d, tokens) in docs.iter().enumerate() {
                for (position, &term) in tokens.iter().enumerate() {
                    let old_topic = assignments[d][position];
                    doc_topic[d][old_topic] -= 1.0;
                    topic_term[old_topic][term] -= 1.0;
                    topic_totals[old_topic] -= 1.0;

                    let mut total = 0.0;
                    for (topic, weight) in weights.iter_mut().enumerate() {
                        *weight = (doc_topic[d][topic] + alpha)
                            * (topic_term[topic][term] + beta)
                            / (topic_totals[topic] + beta * n_terms as f64);
                        total += *weight;
                    }

                    let mut draw = rng.gen_range(0.0..1.0) * total;
                    let mut new_topic = k - 1;
                    for (topic, &weight) in weights.iter().enumerate() {
                        if draw < weight {
                            new_topic = topic;
                            break;
                        }
                        draw -= weight;
                    }

                    assignments[d][position] = new_topic;
                    doc_topic[d][new_topic] += 1.0;
                    topic_term[new_topic][term] += 1.0;
                    topic_totals[new_topic] += 1.0;
                }
            }
        }

        let mut theta = Array2::zeros((n_docs, k));
        for d in 0..n_docs {
            let doc_len: f64 = doc_topic[d].iter().sum();
            for topic in 0..k {
                theta[[d, topic]] =
                    (doc_topic[d][topic] + alpha) / (doc_len + alpha * k as f64);
            }
        }
        theta
    }
}

/// Rule-based entity set: capitalized tokens for Latin-script text, 2..4-char
/// n-grams for CJK text, plus all digit runs.
pub fn simple_entities(title: &str, content: &str) -> Vec<String> {
    let content_head: String = content.chars().take(500).collect();
    let combined = format!("{} {}", title, content_head);

    let mut entities: Vec<String> = if has_latin(&combined) {
        capitalized_tokens(title)
            .into_iter()
            .chain(capitalized_tokens(&content_head))
            .collect()
    } else {
        cjk_ngrams(title, 2, 4)
            .into_iter()
            .chain(cjk_ngrams(&content_head, 2, 4))
            .collect()
    };

    entities.extend(digit_runs(&combined));
    entities
}

/// Jaccard-over-entity-sets similarity matrix.
pub fn entity_similarity_matrix(entity_sets: &[HashSet<String>]) -> Array2<f64> {
    let n = entity_sets.len();
    let mut sim = Array2::zeros((n, n));

    for i in 0..n {
        sim[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let value = if entity_sets[i].is_empty() || entity_sets[j].is_empty() {
                0.0
            } else {
                let intersection = entity_sets[i].intersection(&entity_sets[j]).count() as f64;
                let union = entity_sets[i].union(&entity_sets[j]).count() as f64;
                if union > 0.0 { intersection / union } else { 0.0 }
            };
            sim[[i, j]] = value;
            sim[[j, i]] = value;
        }
    }
    sim
}

/// Gaussian time-proximity kernel: exp(-dt_days^2 / (2 * window^2)).
pub fn time_proximity_matrix(
    times: &[chrono::NaiveDateTime],
    time_window_days: f64,
) -> Array2<f64> {
    let n = times.len();
    let mut sim = Array2::zeros((n, n));
    let denominator = 2.0 * time_window_days * time_window_days;

    for i in 0..n {
        sim[[i, i]] = 1.0;
        for j in (i + 1)..n {
            let dt_seconds = (times[i] - times[j]).num_seconds().abs() as f64;
            let dt_days = dt_seconds / 86_400.0;
            let value = (-(dt_days * dt_days) / denominator).exp();
            sim[[i, j]] = value;
            sim[[j, i]] = value;
        }
    }
    sim
}

/// Cosine similarity across document-topic distributions.
pub fn topic_similarity_matrix(doc_topics: &Array2<f64>) -> Array2<f64> {
    let mut sim = cosine_similarity_matrix(doc_topics);
    for i in 0..sim.nrows() {
        sim[[i, i]] = 1.0;
    }
    sim
}

/// Mean of a row restricted to the given indices (excluding `exclude`).
pub fn mean_similarity(matrix: &Array2<f64>, row: usize, members: &[usize], exclude: usize) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for &j in members {
        if j != exclude {
            total += matrix[[row, j]];
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { total / count as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tfidf_rows_are_unit_length() {
        let docs = vec![
            "china economy policy reform".to_string(),
            "china economy new policy".to_string(),
            "local football match".to_string(),
        ];
        let matrix = TfidfVectorizer::new(1000).fit_transform(&docs);
        for row in matrix.rows() {
            let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9 || norm == 0.0);
        }
    }

    #[test]
    fn similar_documents_score_higher() {
        let docs = vec![
            "china economy policy reform".to_string(),
            "china economy new policy".to_string(),
            "local football match tonight".to_string(),
        ];
        let matrix = TfidfVectorizer::new(1000).fit_transform(&docs);
        let sim = cosine_similarity_matrix(&matrix);
        assert!(sim[[0, 1]] > sim[[0, 2]]);
    }

    #[test]
    fn lda_is_deterministic_for_fixed_seed() {
        let docs = vec![
            "economy market stock trade".to_string(),
            "economy market growth".to_string(),
            "football match champion".to_string(),
        ];
        let counts = CountVectorizer::new(1000).fit_transform(&docs);
        let a = LatentDirichletAllocation::new(20, 42).fit_transform(&counts);
        let b = LatentDirichletAllocation::new(20, 42).fit_transform(&counts);
        assert_eq!(a, b);
    }

    #[test]
    fn lda_rows_are_distributions() {
        let docs = vec!["economy market".to_string(), "football match".to_string()];
        let counts = CountVectorizer::new(1000).fit_transform(&docs);
        let theta = LatentDirichletAllocation::new(5, 42).fit_transform(&counts);
        for row in theta.rows() {
            let total: f64 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn time_kernel_decays_with_distance() {
        let base = chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let times = vec![base, base, base + chrono::Duration::days(10)];
        let sim = time_proximity_matrix(&times, 3.0);
        assert!((sim[[0, 1]] - 1.0).abs() < 1e-9);
        assert!(sim[[0, 2]] < 0.01);
    }

    #[test]
    fn cjk_entities_use_ngrams() {
        let entities = simple_entities("中国经济政策改革", "");
        assert!(entities.contains(&"中国".to_string()));
        assert!(entities.contains(&"经济".to_string()));
    }

    #[test]
    fn latin_entities_use_capitalized_tokens() {
        let entities = simple_entities("OpenAI releases new model", "The Valley reacts");
        assert!(entities.contains(&"OpenAI".to_string()));
        assert!(entities.contains(&"Valley".to_string()));
    }
}
