use crate::core::classify::ContentClass;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionKind {
    Static,
    Dynamic,
    Api,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [
        PartitionKind::Static,
        PartitionKind::Dynamic,
        PartitionKind::Api,
    ];

    /// Images share the dynamic partition; each entry keeps its own class.
    pub fn for_class(class: ContentClass) -> Self {
        match class {
            ContentClass::Api => PartitionKind::Api,
            ContentClass::Static => PartitionKind::Static,
            ContentClass::Image | ContentClass::Dynamic => PartitionKind::Dynamic,
        }
    }
}

impl Display for PartitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                PartitionKind::Static => "static",
                PartitionKind::Dynamic => "dynamic",
                PartitionKind::Api => "api",
            }
        )
    }
}

impl FromStr for PartitionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(PartitionKind::Static),
            "dynamic" => Ok(PartitionKind::Dynamic),
            "api" => Ok(PartitionKind::Api),
            _ => Err(anyhow::anyhow!("Invalid partition kind: {}", s)),
        }
    }
}

/// Version-qualified partition names, e.g. `api-v2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNames {
    version: String,
}

impl PartitionNames {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, kind: PartitionKind) -> String {
        format!("{}-{}", kind, self.version)
    }

    pub fn expected(&self) -> Vec<String> {
        PartitionKind::ALL.iter().map(|kind| self.name(*kind)).collect()
    }

    pub fn is_expected(&self, name: &str) -> bool {
        PartitionKind::ALL.iter().any(|kind| self.name(*kind) == name)
    }

    /// Accepts a bare kind (`api`) or any full partition name.
    pub fn resolve(&self, name: &str) -> String {
        match name.parse::<PartitionKind>() {
            Ok(kind) => self.name(kind),
            Err(_) => name.to_string(),
        }
    }
}
