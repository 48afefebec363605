use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ViewMode {
    Table => "Table",
    Expanded => "Expanded",
});

impl ViewMode {
    /// Switch between the table and the expanded card layout.
    pub fn toggle(self) -> Self {
        match self {
            Self::Table => Self::Expanded,
            Self::Expanded => Self::Table,
        }
    }

    /// Icon shown on the toggle button for the current mode.
    pub fn toggle_icon(self) -> &'static str {
        match self {
            Self::Table => "view-grid",
            Self::Expanded => "view-list",
        }
    }
}

impl Default for ViewMode {
    fn default() -> Self {
        Self::Table
    }
}

str_enum!(StatusTone {
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
    Neutral => "default",
});

impl StatusTone {
    /// Badge tone for a raw appointment status. Unknown statuses are neutral.
    pub fn from_status(status: &str) -> Self {
        status
            .trim()
            .to_lowercase()
            .parse()
            .unwrap_or(Self::Neutral)
    }
}
