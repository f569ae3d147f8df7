/// A terminal job outcome that can travel over a result channel.
///
/// Implementations are plain data: rendering must never fail, so consumers
/// can always expect one textual value per job.
pub trait WorkMsg: Send + 'static {
    /// Canonical text encoding of the message.
    fn render(&self) -> String;

    /// Correlation token of the job that produced this message.
    fn job_token(&self) -> &str;
}
