pub mod home_controller;
pub mod auth_controller;
pub mod dashboard_controller;
pub mod alerts_controller;
pub mod profile_controller;
pub mod monitor_controller;
pub mod telegram_controller;
pub mod realtime_controller;
