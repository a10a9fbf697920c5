/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh, social)
/// - `families`: Family and membership endpoints
/// - `tasks`: Task lifecycle, comment, and reaction endpoints
/// - `notifications`: Notification list and read-marking
/// - `realtime`: WebSocket endpoint for family event channels

pub mod auth;
pub mod families;
pub mod health;
pub mod notifications;
pub mod realtime;
pub mod tasks;
