pub mod record;
pub mod context;
pub mod redact;

pub mod sink;
pub mod console;
pub mod rolling;
pub mod jsonl;

pub mod registry;
pub mod init;
pub mod env;

pub mod span;
pub mod exception;

pub mod tail;
pub mod query;
pub mod follow;
pub mod summary;
pub mod ingest;

pub mod bridge;
