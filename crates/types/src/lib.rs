pub mod responses;
pub mod work;

pub use responses::*;
pub use work::*;

/// Path of service A's callback endpoint.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Path of service A's trigger endpoint.
pub const START_PATH: &str = "/start";

/// Path of service B's processing endpoint.
pub const PROCESS_PATH: &str = "/api/process";

/// Path of service C's slow work endpoint.
pub const DO_WORK_PATH: &str = "/do-work";
