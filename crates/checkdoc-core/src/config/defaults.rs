pub(super) fn default_name() -> String {
    "CheckDoc".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
pub(super) fn default_poll_interval_ms() -> u64 {
    700
}
pub(super) fn default_turn_timeout_secs() -> u64 {
    45
}
pub(super) fn default_request_timeout_secs() -> u64 {
    30
}
pub(super) fn default_api_host() -> String {
    "0.0.0.0".to_string()
}
pub(super) fn default_api_port() -> u16 {
    8080
}
pub(super) fn default_cookie_name() -> String {
    "sid".to_string()
}
pub(super) fn default_cookie_max_age_secs() -> u64 {
    60 * 60 * 24 * 14
}
pub(super) fn default_webhook_path() -> String {
    "/telegram/webhook".to_string()
}
