//! patchwire daemon: hosts render sessions behind a Unix socket.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod settings;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, response_into_data, send_request, DaemonRequest,
    DaemonResponse, EventLine,
};
pub use runtime::{init_tracing, run, start_blocking};
pub use settings::{LogFormat, Settings};
