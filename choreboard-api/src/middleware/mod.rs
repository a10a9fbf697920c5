/// API middleware
///
/// - `security`: OWASP security headers on every response

pub mod security;
