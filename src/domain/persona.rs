use serde::{Deserialize, Serialize};

/// One synthetic employee. Identity within a roster is the email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub email: String,
    pub title: String,
    pub department: String,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        title: impl Into<String>,
        department: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            title: title.into(),
            department: department.into(),
        }
    }

    /// Persona synthesized from a display string that is not on the roster.
    pub fn from_display(display: &str) -> Self {
        let addr = parse_display(display);
        Self::new(addr.name, addr.email, "Employee", "General")
    }

    /// `Name <email>`
    pub fn display(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayAddress {
    pub name: String,
    pub email: String,
}

/// Parse `Name <email>` back into its parts.
///
/// Splits on the first `" <"` and strips trailing `>` characters from the
/// remainder. A string without `" <"` is returned whole as both name and
/// email, which is what callers rely on when a bare address is passed in.
pub fn parse_display(display: &str) -> DisplayAddress {
    match display.split_once(" <") {
        Some((name, rest)) => {
            // only the segment up to the next " <" counts as the address
            let email = rest.split(" <").next().unwrap_or(rest);
            DisplayAddress {
                name: name.to_string(),
                email: email.trim_end_matches('>').to_string(),
            }
        }
        None => DisplayAddress {
            name: display.to_string(),
            email: display.to_string(),
        },
    }
}

/// Email address part of a display string.
pub fn display_email(display: &str) -> String {
    parse_display(display).email
}
