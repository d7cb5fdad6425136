use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("bothichatva.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter =
    Counter::new("bothichatva.client.request_errors");
pub(crate) static CLIENT_REQUEST_RETRIES: Counter = Counter::new("bothichatva.client.retries");
pub(crate) static CLIENT_REQUEST_DURATION: Moments =
    Moments::new("bothichatva.client.request_duration_seconds");
pub(crate) static CLIENT_RETRY_BACKOFF: Moments =
    Moments::new("bothichatva.client.retry_backoff_seconds");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("bothichatva.stream.chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("bothichatva.stream.errors");
pub(crate) static STREAM_BYTES: Counter = Counter::new("bothichatva.stream.bytes");

pub(crate) static REPLY_FRAGMENTS: Counter = Counter::new("bothichatva.reply.fragments");
pub(crate) static REPLIES_COMMITTED: Counter = Counter::new("bothichatva.reply.committed");
pub(crate) static REPLIES_FAILED: Counter = Counter::new("bothichatva.reply.failed");
pub(crate) static REPLY_DURATION: Moments = Moments::new("bothichatva.reply.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);
    collector.register_counter(&CLIENT_REQUEST_RETRIES);
    collector.register_moments(&CLIENT_REQUEST_DURATION);
    collector.register_moments(&CLIENT_RETRY_BACKOFF);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);
    collector.register_counter(&STREAM_BYTES);

    collector.register_counter(&REPLY_FRAGMENTS);
    collector.register_counter(&REPLIES_COMMITTED);
    collector.register_counter(&REPLIES_FAILED);
    collector.register_moments(&REPLY_DURATION);
}
