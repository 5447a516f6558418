use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
pub fn init_tracing(log_level: &str) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let tracing_level = match level.as_str() {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    };

    let filter = EnvFilter::try_new(tracing_level).unwrap_or_else(|_| EnvFilter::new("INFO"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Summary of one finished downstream request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionStats<'a> {
    pub mode: &'a str,
    /// Upstream calls made, including continuations.
    pub rounds: u32,
    pub answer_len: usize,
    pub finish_reason: &'a str,
    /// The last upstream call ended with an end-of-turn record.
    pub turn_completed: bool,
}

/// Log a completed request, computing duration from start time.
pub fn log_request_complete(model: &str, stats: &CompletionStats<'_>, start_time: std::time::Instant) {
    tracing::info!(
        model = model,
        mode = stats.mode,
        rounds = stats.rounds,
        answer_len = stats.answer_len,
        finish_reason = stats.finish_reason,
        turn_completed = stats.turn_completed,
        duration_seconds = start_time.elapsed().as_secs_f64(),
        "request completed"
    );
}
