use std::fmt;

use crate::models::academic::ResourceQuery;
use crate::models::session::SubjectKey;

/// The namespace every gateway key lives under.
pub const KEY_NAMESPACE: &str = "mis";

/// The kinds of portal pages the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Attendance,
    StudyPlan,
    Schedule,
    Grades,
    Logbook,
}

impl ResourceKind {
    /// The segment used in cache keys and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attendance => "absen",
            Self::StudyPlan => "frs",
            Self::Schedule => "jadwal",
            Self::Grades => "nilai",
            Self::Logbook => "logbook",
        }
    }

    /// The portal page serving this kind, relative to the portal root.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Attendance => "absen.php",
            Self::StudyPlan => "FRS_mbkm.php",
            Self::Schedule => "jadwal_kul.php",
            Self::Grades => "nilai_sem.php",
            Self::Logbook => "entry_logbook_kp1.php",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully qualified store key.
///
/// All keys of one subject share `mis:{subject}:` so the subject's whole
/// keyspace can be dropped with a single prefix scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// The key of one page for one subject and query.
    pub fn resource<Q>(subject: &SubjectKey, kind: ResourceKind, query: &Q) -> Self
    where
        Q: ResourceQuery + ?Sized,
    {
        Self(format!(
            "{}{}:{}",
            Self::subject_prefix(subject),
            kind.as_str(),
            query.key_segments()
        ))
    }

    /// The key of the subject's liveness marker.
    pub fn liveness(subject: &SubjectKey) -> Self {
        Self(format!("{}session", Self::subject_prefix(subject)))
    }

    /// The prefix shared by every key of `subject`.
    pub fn subject_prefix(subject: &SubjectKey) -> String {
        format!("{}:{}:", KEY_NAMESPACE, subject.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
