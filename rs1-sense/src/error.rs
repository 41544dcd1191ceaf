use rs1_types::RadarKind;

pub type Result<M> = std::result::Result<M, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("{source}")]
    Serial {
        #[from]
        source: tokio_serial::Error,
    },
    #[error("serial driver install failed for {radar}: {reason}")]
    DriverInstall { radar: RadarKind, reason: String },
    #[error("watchdog source table full")]
    WatchdogCapacity,
    #[error("scheduler task table full")]
    SchedulerCapacity,
}
