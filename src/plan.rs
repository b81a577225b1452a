use std::fmt;
use std::str::FromStr;

use hashbrown::HashSet;

use crate::error::PipelineError;

/// A single target size, e.g. `100x100=thumb`.
///
/// The suffix doubles as the marker used to recognise the variant's
/// own key when its upload triggers another event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSpec {
    width: u32,
    height: u32,
    suffix: String,
}

impl VariantSpec {
    pub fn new(width: u32, height: u32, suffix: impl Into<String>) -> Result<Self, PipelineError> {
        let suffix = suffix.into();
        let entry = || format!("{}x{}={}", width, height, suffix);

        if width == 0 {
            return Err(PipelineError::invalid_spec(entry(), "width must be positive"));
        }
        if height == 0 {
            return Err(PipelineError::invalid_spec(entry(), "height must be positive"));
        }
        if suffix.is_empty() {
            return Err(PipelineError::invalid_spec(entry(), "suffix must not be empty"));
        }
        if suffix.chars().any(char::is_whitespace) {
            return Err(PipelineError::invalid_spec(entry(), "suffix must not contain whitespace"));
        }

        Ok(Self {
            width,
            height,
            suffix,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl fmt::Display for VariantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}={}", self.width, self.height, self.suffix)
    }
}

impl FromStr for VariantSpec {
    type Err = PipelineError;

    /// Parses the `WxH=suffix` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entry = s.trim();
        let (dims, suffix) = entry
            .split_once('=')
            .ok_or_else(|| PipelineError::invalid_spec(entry, "expected WxH=suffix"))?;
        let (width, height) = dims
            .split_once('x')
            .ok_or_else(|| PipelineError::invalid_spec(entry, "expected WxH before '='"))?;

        let width = width
            .parse::<u32>()
            .map_err(|_| PipelineError::invalid_spec(entry, "width must be a positive integer"))?;
        let height = height
            .parse::<u32>()
            .map_err(|_| PipelineError::invalid_spec(entry, "height must be a positive integer"))?;

        Self::new(width, height, suffix).map_err(|e| match e {
            PipelineError::InvalidVariantSpec { reason, .. } => {
                PipelineError::invalid_spec(entry, reason)
            },
            other => other,
        })
    }
}

/// The immutable, non-empty set of target sizes.
///
/// Built once at startup and shared read-only between every object
/// being processed.
#[derive(Debug, Clone)]
pub struct VariantPlan {
    specs: Vec<VariantSpec>,
}

impl VariantPlan {
    /// Strictly parses a list of `WxH=suffix` entries, any bad entry fails
    /// the whole plan.
    pub fn parse<I, S>(entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let specs = entries
            .into_iter()
            .map(|entry| entry.as_ref().parse::<VariantSpec>())
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_specs(specs)
    }

    /// Builds a plan from already constructed specs, rejecting duplicate
    /// suffixes.
    pub fn from_specs(specs: Vec<VariantSpec>) -> Result<Self, PipelineError> {
        {
            let mut seen = HashSet::with_capacity(specs.len());
            if let Some(duplicate) = specs.iter().find(|spec| !seen.insert(spec.suffix())) {
                return Err(PipelineError::invalid_spec(
                    duplicate.to_string(),
                    "suffix is already used by another size",
                ));
            }
        }

        if specs.is_empty() {
            return Err(PipelineError::NoVariantsConfigured);
        }

        Ok(Self { specs })
    }

    /// The lenient form used for configuration.
    ///
    /// Malformed and duplicate entries are logged and skipped, only an
    /// empty result is an error.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut specs: Vec<VariantSpec> = vec![];

        for entry in entries {
            let entry = entry.as_ref();
            let spec = match entry.parse::<VariantSpec>() {
                Ok(spec) => spec,
                Err(e) => {
                    warn!("Skipping target size: {}", e);
                    continue;
                },
            };

            if specs.iter().any(|existing| existing.suffix() == spec.suffix()) {
                warn!(
                    "Skipping target size {:?}, the suffix {:?} is already in use",
                    entry,
                    spec.suffix(),
                );
                continue;
            }

            specs.push(spec);
        }

        Self::from_specs(specs)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, VariantSpec> {
        self.specs.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[inline]
    pub fn suffixes(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(VariantSpec::suffix)
    }
}
