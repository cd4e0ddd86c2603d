//! Core newtypes and the task-type registry.
//!
//! Newtype wrappers prevent common bugs like passing a thread id where a
//! lane id is expected, and make function signatures self-documenting.

use std::fmt;

/// A virtual "lane" identifier.
///
/// Lanes let a trace visualizer draw async tasks as independent tracks. A
/// lane id is either an OS thread id (the default for synchronous regions)
/// or a synthetic id minted by [`crate::lanes::LaneAllocator`] starting at
/// `1_000_000`, keeping the two namespaces disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub u64);

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First synthetic lane id minted by the lane allocator.
pub const FIRST_SYNTHETIC_LANE_ID: u64 = 1_000_000;

/// Sort index assigned to synthetic lanes so visualizers sort them below
/// real OS threads.
pub const SYNTHETIC_LANE_SORT_INDEX: i64 = 1_000_000;

/// A monotonic nanosecond timestamp or duration.
///
/// Kept as a thin newtype over `u64` so call sites cannot accidentally mix
/// nanoseconds with microseconds (the unit the JSON trace format uses).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Nanos(pub u64);

impl Nanos {
    #[must_use]
    pub fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    /// `self - other`, clamped to zero on underflow. Clock anomalies never
    /// raise an error; they clamp.
    #[must_use]
    pub fn saturating_since(self, other: Nanos) -> Nanos {
        Nanos(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Nanos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// A coarse phase of the build this profiler instruments, used by
/// `markPhase`. A closed enum rather than a free string keeps phase
/// markers comparable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilePhase {
    Init,
    Analyze,
    Execute,
    Finish,
}

impl ProfilePhase {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ProfilePhase::Init => "Init",
            ProfilePhase::Analyze => "Analyze",
            ProfilePhase::Execute => "Execute",
            ProfilePhase::Finish => "Finish",
        }
    }
}

impl fmt::Display for ProfilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// The closed set of task categories a recorded event can belong to.
///
/// Fixed at build time: adding a category requires a code change, not
/// configuration, so every downstream consumer of a `TaskType` can match
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    Info,
    Action,
    ActionCheck,
    ActionCounts,
    ActionCacheCounts,
    Phase,
    CriticalPathComponent,
    Unknown,
    VfsStat,
    VfsOpen,
    VfsRead,
    VfsWrite,
    VfsGlob,
    VfsFindPackage,
    VfsXattr,
}

impl TaskType {
    /// All task types, in stable declaration order. Used to build the
    /// per-type histogram and slowest-task aggregator tables at `start`.
    pub const ALL: &'static [TaskType] = &[
        TaskType::Info,
        TaskType::Action,
        TaskType::ActionCheck,
        TaskType::ActionCounts,
        TaskType::ActionCacheCounts,
        TaskType::Phase,
        TaskType::CriticalPathComponent,
        TaskType::Unknown,
        TaskType::VfsStat,
        TaskType::VfsOpen,
        TaskType::VfsRead,
        TaskType::VfsWrite,
        TaskType::VfsGlob,
        TaskType::VfsFindPackage,
        TaskType::VfsXattr,
    ];

    /// `cat` field of the emitted Chrome Trace event: the human-readable
    /// category name.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            TaskType::Info => "Info",
            TaskType::Action => "Action",
            TaskType::ActionCheck => "Action check",
            TaskType::ActionCounts => "Action counts",
            TaskType::ActionCacheCounts => "Action cache counts",
            TaskType::Phase => "Phase",
            TaskType::CriticalPathComponent => "Critical path component",
            TaskType::Unknown => "Unknown",
            TaskType::VfsStat => "VFS stat",
            TaskType::VfsOpen => "VFS open",
            TaskType::VfsRead => "VFS read",
            TaskType::VfsWrite => "VFS write",
            TaskType::VfsGlob => "VFS glob",
            TaskType::VfsFindPackage => "VFS find package",
            TaskType::VfsXattr => "VFS xattr",
        }
    }

    /// Events shorter than this are dropped (not enqueued) unless
    /// `recordAllDurations` is set, though the histogram still sees them.
    #[must_use]
    pub fn min_duration(self) -> Nanos {
        match self {
            TaskType::VfsRead | TaskType::VfsWrite => Nanos(10_000_000), // 10ms
            TaskType::VfsStat | TaskType::VfsOpen | TaskType::VfsGlob
            | TaskType::VfsFindPackage | TaskType::VfsXattr => Nanos(10_000_000),
            TaskType::CriticalPathComponent => Nanos(50_000_000), // 50ms, lock-like cost
            _ => Nanos(0),
        }
    }

    #[must_use]
    pub fn is_vfs(self) -> bool {
        matches!(
            self,
            TaskType::VfsStat
                | TaskType::VfsOpen
                | TaskType::VfsRead
                | TaskType::VfsWrite
                | TaskType::VfsGlob
                | TaskType::VfsFindPackage
                | TaskType::VfsXattr
        )
    }

    /// Whether a slowest-task aggregator (C4) should track this type.
    #[must_use]
    pub fn collects_slowest_instances(self) -> bool {
        matches!(
            self,
            TaskType::Action
                | TaskType::ActionCheck
                | TaskType::CriticalPathComponent
                | TaskType::VfsStat
                | TaskType::VfsOpen
                | TaskType::VfsRead
                | TaskType::VfsWrite
                | TaskType::VfsGlob
                | TaskType::VfsFindPackage
                | TaskType::VfsXattr
        )
    }

    /// True for the two `*_COUNTS` types that back [`crate::counters`].
    #[must_use]
    pub fn is_counter_series(self) -> bool {
        matches!(self, TaskType::ActionCounts | TaskType::ActionCacheCounts)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
