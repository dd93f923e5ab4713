pub mod alert_log;
pub mod kv_store;
pub mod notify;
pub mod threshold_store;
pub mod webhook;
