use serde::Serialize;

/// Registry used for hosted dependencies when nothing else is configured.
pub const DEFAULT_REGISTRY: &str = "https://pub.dev";

/// Where a declared dependency is fetched from. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementSource {
    Hosted {
        url: String,
    },
    Git {
        url: String,
        path: Option<String>,
        reference: Option<String>,
        resolved_ref: Option<String>,
        branch: Option<String>,
    },
    Path {
        relative: String,
    },
}

impl RequirementSource {
    pub fn hosted_default() -> Self {
        Self::Hosted {
            url: DEFAULT_REGISTRY.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Hosted { .. } => "hosted",
            Self::Git { .. } => "git",
            Self::Path { .. } => "path",
        }
    }
}

/// One declared dependency constraint to be rewritten by an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequirement {
    /// Constraint string as it should appear in the manifest, if any.
    pub requirement: Option<String>,
    /// Semantic tags such as `dev` for dev-dependencies.
    pub groups: Vec<String>,
    /// Manifest the requirement originates from, relative to the project root.
    pub file: String,
    pub source: RequirementSource,
}

/// The single dependency an orchestration run is allowed to touch.
///
/// Updates are strictly one dependency per invocation; callers needing more
/// issue one run per dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDependency {
    pub name: String,
    /// Target version, when the caller pins one. `None` means "latest the
    /// resolver accepts".
    pub version: Option<String>,
    pub requirement: DependencyRequirement,
}

impl TargetDependency {
    pub fn new(name: impl Into<String>, version: Option<String>, requirement: DependencyRequirement) -> Self {
        Self {
            name: name.into(),
            version,
            requirement,
        }
    }
}

/// Wire shape of a requirement as the native patch helper expects it.
///
/// All source keys are present on every variant, absent ones as `null`.
#[derive(Debug, Serialize)]
pub struct HelperRequirement<'a> {
    pub requirement: Option<&'a str>,
    pub file: &'a str,
    pub groups: &'a [String],
    pub source: HelperSource<'a>,
}

#[derive(Debug, Serialize)]
pub struct HelperSource<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub url: Option<&'a str>,
    pub path: Option<&'a str>,
    #[serde(rename = "ref")]
    pub reference: Option<&'a str>,
    pub resolved_ref: Option<&'a str>,
    pub relative: Option<&'a str>,
}

impl<'a> HelperRequirement<'a> {
    pub fn from_requirement(requirement: &'a DependencyRequirement) -> Self {
        let source = match &requirement.source {
            RequirementSource::Hosted { url } => HelperSource {
                kind: "hosted",
                url: Some(url),
                path: None,
                reference: None,
                resolved_ref: None,
                relative: None,
            },
            RequirementSource::Git {
                url,
                path,
                reference,
                resolved_ref,
                ..
            } => HelperSource {
                kind: "git",
                url: Some(url),
                path: path.as_deref(),
                reference: reference.as_deref(),
                resolved_ref: resolved_ref.as_deref(),
                relative: None,
            },
            RequirementSource::Path { relative } => HelperSource {
                kind: "path",
                url: None,
                path: None,
                reference: None,
                resolved_ref: None,
                relative: Some(relative),
            },
        };

        Self {
            requirement: requirement.requirement.as_deref(),
            file: &requirement.file,
            groups: &requirement.groups,
            source,
        }
    }
}
