use crate::common::{FaceLensError, Result};
use crate::core::session::Mode;
use std::fmt;
use std::io::{BufRead, Write};

pub const MISSING_CREDENTIALS: &str = "Please enter both username and password.";

/// Credentials accepted by the login gate. Nothing is sent anywhere; the
/// gate only checks that both fields were filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
}

pub fn submit(username: &str, password: &str) -> Result<Credentials> {
    let username = username.trim();
    if username.is_empty() || password.trim().is_empty() {
        return Err(FaceLensError::Validation(MISSING_CREDENTIALS.to_string()));
    }
    Ok(Credentials { username: username.to_string() })
}

/// Entries of the feature menu shown after login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    LiveFaceShape,
    SkinAnalysis,
}

impl Feature {
    pub const ALL: [Feature; 2] = [Feature::LiveFaceShape, Feature::SkinAnalysis];

    pub fn mode(self) -> Mode {
        match self {
            Feature::LiveFaceShape => Mode::Continuous,
            Feature::SkinAnalysis => Mode::Gated,
        }
    }

    /// Parses a menu answer: the entry number or its short name.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "live" => Some(Feature::LiveFaceShape),
            "2" | "skin" => Some(Feature::SkinAnalysis),
            _ => None,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::LiveFaceShape => write!(f, "Live face shape"),
            Feature::SkinAnalysis => write!(f, "Skin analysis"),
        }
    }
}

fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W, label: &str) -> Result<String> {
    write!(output, "{}", label)?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(FaceLensError::Validation("input closed".to_string()));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Interactive login: asks for whatever credentials were not given on the
/// command line, repeating until both are present.
pub fn login_interactive<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<Credentials> {
    let mut username = username.map(str::to_string);
    let mut password = password.map(str::to_string);

    loop {
        let user = match username.take() {
            Some(u) => u,
            None => prompt(input, output, "Username: ")?,
        };
        let pass = match password.take() {
            Some(p) => p,
            None => prompt(input, output, "Password: ")?,
        };

        match submit(&user, &pass) {
            Ok(creds) => return Ok(creds),
            Err(e) => {
                tracing::debug!("Login rejected: {}", e);
                writeln!(output, "{}", e)?;
            }
        }
    }
}

/// Shows the feature menu and reads a choice.
pub fn choose_feature<R: BufRead, W: Write>(input: &mut R, output: &mut W, creds: &Credentials) -> Result<Feature> {
    writeln!(output, "Welcome, {}", creds.username)?;
    for (i, feature) in Feature::ALL.iter().enumerate() {
        writeln!(output, "  {}) {}", i + 1, feature)?;
    }

    loop {
        let answer = prompt(input, output, "Select feature: ")?;
        match Feature::parse(&answer) {
            Some(feature) => return Ok(feature),
            None => writeln!(output, "Unknown choice: {}", answer.trim())?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn blank_fields_are_rejected() {
        for (user, pass) in [("", "pw"), ("alice", ""), ("   ", "pw"), ("alice", "  ")] {
            let err = submit(user, pass).unwrap_err();
            assert_eq!(err.to_string(), MISSING_CREDENTIALS);
        }
    }

    #[test]
    fn username_is_trimmed() {
        assert_eq!(submit("  alice ", "pw").unwrap().username, "alice");
    }

    #[test]
    fn interactive_login_reprompts_until_complete() {
        let mut input = Cursor::new("\nsecret\nbob\nsecret\n");
        let mut output = Vec::new();

        let creds = login_interactive(&mut input, &mut output, None, None).unwrap();
        assert_eq!(creds.username, "bob");
        assert!(String::from_utf8(output).unwrap().contains(MISSING_CREDENTIALS));
    }

    #[test]
    fn closed_input_ends_login() {
        let mut input = Cursor::new("");
        let mut output = Vec::new();
        assert!(login_interactive(&mut input, &mut output, Some("bob"), None).is_err());
    }

    #[test]
    fn menu_accepts_numbers_and_names() {
        let creds = Credentials { username: "bob".into() };
        let mut input = Cursor::new("7\nskin\n");
        let mut output = Vec::new();

        let feature = choose_feature(&mut input, &mut output, &creds).unwrap();
        assert_eq!(feature, Feature::SkinAnalysis);
        assert_eq!(feature.mode(), Mode::Gated);
        assert_eq!(Feature::parse("1"), Some(Feature::LiveFaceShape));
    }
}
