pub mod event_log;
pub mod handle;
pub mod models;
pub mod monitor;
pub mod poller;
pub mod sink;

pub use event_log::{EventLog, LogEntry, LogLevel};
pub use handle::{FileBackend, HandleBackend, HandleOutcome, MemoryBackend, PersistentJobHandle};
pub use models::{IngestTarget, JobStatus, ProgressSnapshot, Source, ValidationError};
pub use monitor::{
    JobMonitor, MonitorError, MonitorPhase, MonitorSettings, ResumeOutcome, TerminalState,
};
pub use poller::{PollTick, StatusPoller};
pub use sink::{NullSink, PresentationSink};
