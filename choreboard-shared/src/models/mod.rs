/// Database models for Choreboard
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts
/// - `family`: Family groups with invite codes
/// - `membership`: User-family relationships with roles
/// - `task`: Household tasks with status, priority, and due dates
/// - `assignment`: Task-user delegation records
/// - `comment`: Task comments and reactions
/// - `notification`: System-generated notifications

pub mod assignment;
pub mod comment;
pub mod family;
pub mod membership;
pub mod notification;
pub mod task;
pub mod user;
