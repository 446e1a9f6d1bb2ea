mod ledger;
mod pool;
mod progress;
mod report;
mod smtp;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
mod transport;

pub use ledger::ConnectionId;
pub use pool::{BatchResult, EngineConfig, EngineSummary, SendEngine};
pub use progress::{BufferedProgress, Progress, ProgressSink, StdoutProgress, minutes_seconds};
pub use report::{Failure, Report, ReportError, ReportFiles};
pub use smtp::{SmtpConnector, SmtpLink};
pub use transport::{Connection, Connector, InlineImage, Letter, Outgoing, SendError};
