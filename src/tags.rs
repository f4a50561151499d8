// src/tags.rs
use std::collections::HashMap;
use std::collections::HashSet;

use crate::types::JobRecord;

/// The `k` most frequent tags across `jobs`, most frequent first.
/// Ties keep the order in which tags were first seen. A tag listed twice on
/// the same job counts once.
pub fn top_tags<'a, I>(jobs: I, k: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a JobRecord>,
{
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for job in jobs {
        let mut seen_on_job = HashSet::new();
        for tag in job.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if !seen_on_job.insert(tag) {
                continue;
            }
            match index.get(tag) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(tag, counts.len());
                    counts.push((tag, 1));
                }
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(k)
        .map(|(tag, _)| tag.to_string())
        .collect()
}
