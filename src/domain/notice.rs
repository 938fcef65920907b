//! The single user-facing summary produced per logical operation

use std::fmt;

use serde::Serialize;

use crate::domain::composer::RequestStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Partial,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

fn pages(count: usize) -> &'static str {
    if count == 1 { "page" } else { "pages" }
}

fn posts(count: usize) -> &'static str {
    if count == 1 { "post" } else { "posts" }
}

impl Notice {
    /// Summary of a fan-out submission
    pub fn for_publish(succeeded: usize, failed: usize, status: RequestStatus) -> Self {
        if failed == 0 {
            let message = match status {
                RequestStatus::Published => {
                    format!("Published to {} {}", succeeded, pages(succeeded))
                }
                RequestStatus::Scheduled => {
                    format!("Scheduled for {} {}", succeeded, pages(succeeded))
                }
            };
            return Self {
                level: NoticeLevel::Success,
                message,
            };
        }

        Self {
            level: if succeeded == 0 {
                NoticeLevel::Error
            } else {
                NoticeLevel::Partial
            },
            message: format!("{} succeeded, {} failed", succeeded, failed),
        }
    }

    /// Summary of a campaign delete
    pub fn for_delete(deleted: usize, failed: usize) -> Self {
        if failed == 0 {
            return Self {
                level: NoticeLevel::Success,
                message: format!("Deleted {} {}", deleted, posts(deleted)),
            };
        }

        Self {
            level: if deleted == 0 {
                NoticeLevel::Error
            } else {
                NoticeLevel::Partial
            },
            message: format!("{} deleted, {} failed", deleted, failed),
        }
    }

    /// An operation that stopped before any per-destination work
    pub fn failure(err: &dyn fmt::Display) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
