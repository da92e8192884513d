use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use std::path::Path;

/// Initialize logging. With `debug` on, everything from `debug` up goes to
/// the log file and stdout. Otherwise `info` and above, with size rotation.
///
/// The returned handle flushes buffered output when dropped, so keep it
/// alive for the lifetime of the process.
pub fn init(log_dir: &Path, debug: bool) -> Result<LoggerHandle, Box<dyn std::error::Error>> {
    let file_spec = FileSpec::default()
        .directory(log_dir)
        .basename("minimon-sessions");

    let logger = if debug {
        Logger::try_with_env_or_str("debug")?
            .log_to_file(file_spec)
            .duplicate_to_stdout(Duplicate::All)
    } else {
        Logger::try_with_env_or_str("info")?
            .log_to_file(file_spec)
            .duplicate_to_stdout(Duplicate::Info)
            .rotate(
                Criterion::Size(10_000_000), // 10MB
                Naming::Numbers,
                Cleanup::KeepLogFiles(3),
            )
    };

    let handle = logger.write_mode(WriteMode::BufferAndFlush).start()?;

    Ok(handle)
}
