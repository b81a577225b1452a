use crate::plan::{VariantPlan, VariantSpec};

/// Naming of variant keys.
///
/// Variants are stored at `<source key>/<suffix>`, anything ending in one of
/// the configured suffixes is therefore treated as a variant and never
/// processed again. This check must run before any I/O, otherwise every
/// upload would trigger another round of processing.
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    suffixes: Vec<String>,
}

impl KeyPolicy {
    pub fn new(plan: &VariantPlan) -> Self {
        Self {
            suffixes: plan.suffixes().map(str::to_owned).collect(),
        }
    }

    pub fn is_derivative(&self, key: &str) -> bool {
        self.suffixes.iter().any(|suffix| key.ends_with(suffix.as_str()))
    }

    #[inline]
    pub fn derived_key(source_key: &str, spec: &VariantSpec) -> String {
        format!("{}/{}", source_key, spec.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> (VariantPlan, KeyPolicy) {
        let plan = VariantPlan::parse(["100x100=thumb", "400x400=medium"]).unwrap();
        let policy = KeyPolicy::new(&plan);
        (plan, policy)
    }

    #[test]
    fn derived_keys_append_the_suffix() {
        let (plan, _) = policy();
        let keys: Vec<String> = plan
            .iter()
            .map(|spec| KeyPolicy::derived_key("photos/a.jpg", spec))
            .collect();

        assert_eq!(keys, vec!["photos/a.jpg/thumb", "photos/a.jpg/medium"]);
    }

    #[test]
    fn every_derived_key_is_a_derivative() {
        let (plan, policy) = policy();

        for source in ["a.png", "photos/a.jpg", "deeply/nested/path/img.gif", ""] {
            for spec in plan.iter() {
                assert!(policy.is_derivative(&KeyPolicy::derived_key(source, spec)));
            }
        }
    }

    #[test]
    fn unrelated_keys_are_not_derivatives() {
        let (_, policy) = policy();

        for key in ["photos/a.jpg", "thumbs/a.png", "medium.gif/original", "thumb.png"] {
            assert!(!policy.is_derivative(key), "{} flagged as a variant", key);
        }
    }

    #[test]
    fn derived_keys_are_stable() {
        let (plan, _) = policy();
        let spec = plan.iter().next().unwrap();

        assert_eq!(
            KeyPolicy::derived_key("x/y.png", spec),
            KeyPolicy::derived_key("x/y.png", spec),
        );
    }
}
