/// Shared types used across the codebase
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declares a text-backed status enumeration with its wire/database spelling.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("invalid {}: {}", stringify!($name), other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl PartialEq<$name> for String {
            fn eq(&self, other: &$name) -> bool {
                self.as_str() == other.as_str()
            }
        }
    };
}

text_enum!(
    /// Account role carried in every token.
    Role { Student => "student", Tutor => "tutor", Admin => "admin" }
);

text_enum!(UserStatus { Active => "active", Suspended => "suspended" });

text_enum!(TutorStatus { Pending => "pending", Approved => "approved", Rejected => "rejected" });

text_enum!(DocumentStatus { Pending => "pending", Verified => "verified", Rejected => "rejected" });

text_enum!(DocumentType { IdCard => "id_card", Degree => "degree", Certificate => "certificate", Other => "other" });

text_enum!(SessionStatus { Scheduled => "scheduled", Completed => "completed", Cancelled => "cancelled" });

text_enum!(PaymentStatus { Completed => "completed", Refunded => "refunded" });

text_enum!(PaymentMethod { Card => "card", Wallet => "wallet", BankTransfer => "bank_transfer" });

text_enum!(DisputeStatus { Open => "open", Resolved => "resolved" });

text_enum!(ExamStatus { Draft => "draft", Published => "published" });

text_enum!(PlannerItemType { Task => "task", Study => "study", Exam => "exam", Session => "session", Reminder => "reminder" });

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_text_form() {
        assert_eq!("tutor".parse::<Role>().unwrap(), Role::Tutor);
        assert_eq!(SessionStatus::Cancelled.as_str(), "cancelled");
        assert!("root".parse::<Role>().is_err());
        assert_eq!(PaymentMethod::ALL, &["card", "wallet", "bank_transfer"]);
    }

    #[test]
    fn compares_with_row_strings() {
        let status = "scheduled".to_string();
        assert!(status == SessionStatus::Scheduled);
        assert!(status != SessionStatus::Completed);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), "admin");
        assert_eq!(serde_json::from_str::<DocumentType>("\"id_card\"").unwrap(), DocumentType::IdCard);
    }
}
