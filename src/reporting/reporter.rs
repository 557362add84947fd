use crate::reporting::model::Issue;
use indexmap::IndexMap;
use parking_lot::Mutex;

/// Scan-wide issue collection, keyed by digest.
#[derive(Default)]
pub struct IssueLog {
    issues: Mutex<IndexMap<String, Issue>>,
}

impl IssueLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true for a new digest; repeats only bump `variations`.
    pub fn log(&self, issue: Issue) -> bool {
        let mut issues = self.issues.lock();
        match issues.get_mut(&issue.digest) {
            Some(existing) => {
                existing.variations += 1;
                false
            }
            None => {
                tracing::info!(
                    "[{}] {} in {} input '{}'",
                    issue.severity,
                    issue.name,
                    issue.vector.kind,
                    issue.vector.affected_input
                );
                issues.insert(issue.digest.clone(), issue);
                true
            }
        }
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().values().cloned().collect()
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.issues.lock().contains_key(digest)
    }

    pub fn len(&self) -> usize {
        self.issues.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::payload::mutation::Mutation;
    use crate::payload::options::Format;
    use crate::reporting::model::IssueFields;
    use url::Url;

    #[test]
    fn test_repeats_count_as_variations() {
        let link = Element::link(&Url::parse("http://example.com/?q=1").unwrap());
        let log = IssueLog::new();
        for seed in ["a", "b", "c"] {
            let m = Mutation::value(&link, "q", seed, Format::STRAIGHT).unwrap();
            log.log(Issue::new("check", IssueFields::default(), &m, None));
        }
        assert_eq!(log.len(), 1);
        let issues = log.issues();
        assert_eq!(issues[0].variations, 3);
        assert_eq!(issues[0].vector.seed, "a");
        assert!(log.contains(&issues[0].digest));
    }
}
