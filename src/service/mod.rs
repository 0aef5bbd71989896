pub mod app_state;
pub mod poller;
pub mod storage;
