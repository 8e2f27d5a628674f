//! Backend access: the blocking HTTP client and the worker thread that keeps
//! it off the UI thread.

pub mod client;
pub mod worker;

pub use client::{HttpSessionApi, SessionApi, DEFAULT_API_BASE_URL};
pub use worker::{
    ApiReply, ApiRequest, ApiResponse, Envelope, Generation, RecordingSink, RequestSink,
    RequestWorker,
};
