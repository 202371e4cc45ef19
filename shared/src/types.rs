//! Workload identity and the health-callback path codec

use crate::errors::{SharedError, SharedResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path prefix under which workload proxies report health to the harness
pub const HEALTH_PREFIX: &str = "/health";

/// Hierarchical, path-like workload identifier (e.g. `/harness/group/app`)
///
/// Always normalised: a single leading `/`, no trailing `/`, no empty
/// segments. The root namespace renders as `/`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkloadId {
    segments: Vec<String>,
}

impl WorkloadId {
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    pub fn parse(input: &str) -> SharedResult<Self> {
        let segments: Vec<String> = input
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();

        let invalid = segments
            .iter()
            .any(|s| s == "." || s == ".." || s.chars().any(char::is_whitespace));
        if invalid {
            return Err(SharedError::InvalidWorkloadId {
                input: input.to_string(),
            });
        }

        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> SharedResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self::parse(&joined)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a relative path below this id
    pub fn child(&self, relative: &str) -> SharedResult<Self> {
        let nested = Self::parse(relative)?;
        let mut segments = self.segments.clone();
        segments.extend(nested.segments);
        Ok(Self { segments })
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments })
    }
}

impl fmt::Display for WorkloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl FromStr for WorkloadId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for WorkloadId {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WorkloadId> for String {
    fn from(id: WorkloadId) -> Self {
        id.to_string()
    }
}

/// The `(workload, version, port)` triple a health probe is keyed by
///
/// Port `0` is the definition-level sentinel: it stands for every instance
/// of that workload version.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HealthTarget {
    pub workload_id: WorkloadId,
    pub version_id: String,
    pub port: u16,
}

impl HealthTarget {
    pub fn new(workload_id: WorkloadId, version_id: impl Into<String>, port: u16) -> Self {
        Self {
            workload_id,
            version_id: version_id.into(),
            port,
        }
    }

    /// `/health/<workload segments>/<version>` without the port, the form
    /// handed to a workload proxy that appends its own port
    pub fn base_path(workload_id: &WorkloadId, version_id: &str) -> String {
        if workload_id.is_root() {
            format!("{HEALTH_PREFIX}/{version_id}")
        } else {
            format!("{HEALTH_PREFIX}{workload_id}/{version_id}")
        }
    }

    pub fn path(&self) -> String {
        format!("{}/{}", Self::base_path(&self.workload_id, &self.version_id), self.port)
    }

    /// Parse `/health/<segments...>/<version>/<port>`
    pub fn parse_path(path: &str) -> SharedResult<Self> {
        let malformed = |reason: &str| SharedError::MalformedHealthPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let rest = path
            .strip_prefix(HEALTH_PREFIX)
            .filter(|rest| rest.starts_with('/'))
            .ok_or_else(|| malformed("missing /health prefix"))?;

        let mut segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 3 {
            return Err(malformed("expected <workload>/<version>/<port>"));
        }

        let port = segments
            .pop()
            .and_then(|raw| raw.parse::<u16>().ok())
            .ok_or_else(|| malformed("port is not a number"))?;
        let version_id = segments.pop().map(str::to_string).unwrap_or_default();
        let workload_id =
            WorkloadId::from_segments(segments).map_err(|_| malformed("invalid workload id"))?;

        Ok(Self {
            workload_id,
            version_id,
            port,
        })
    }
}

impl fmt::Display for HealthTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.workload_id, self.version_id, self.port)
    }
}
