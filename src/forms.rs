//! Submitted forms and their validation rules.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
    static ref ROLE_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,32}$").unwrap();
}

const MAX_NAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Error messages keyed by form field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<&'static str, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn require(&mut self, field: &'static str, value: &str) -> bool {
        if value.is_empty() {
            self.add(field, "This field is required.");
            false
        } else {
            true
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl LoginForm {
    pub fn normalize(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.require("username", &self.username);
        errors.require("password", &self.password);
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm: String,
}

impl RegistrationForm {
    pub fn normalize(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.firstname = self.firstname.trim().to_string();
        self.lastname = self.lastname.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();

        if errors.require("username", &self.username) && !USERNAME_RE.is_match(&self.username) {
            errors.add(
                "username",
                "Use 3 to 32 letters, digits, dots, dashes or underscores.",
            );
        }
        for (field, value) in [("firstname", &self.firstname), ("lastname", &self.lastname)] {
            if errors.require(field, value) && value.chars().count() > MAX_NAME_LEN {
                errors.add(field, format!("At most {MAX_NAME_LEN} characters."));
            }
        }
        if errors.require("email", &self.email) && !is_valid_email(&self.email) {
            errors.add("email", "Invalid email address.");
        }
        if errors.require("password", &self.password)
            && self.password.chars().count() < MIN_PASSWORD_LEN
        {
            errors.add(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters."),
            );
        }
        if self.confirm != self.password {
            errors.add("confirm", "Passwords must match.");
        }
        errors
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub addrole: String,
    #[serde(default)]
    pub remrole: String,
}

impl RoleForm {
    pub fn normalize(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.addrole = self.addrole.trim().to_string();
        self.remrole = self.remrole.trim().to_string();
        self
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();
        errors.require("username", &self.username);
        if self.addrole.is_empty() && self.remrole.is_empty() {
            errors.add("addrole", "Enter a role to add or remove.");
        }
        for (field, value) in [("addrole", &self.addrole), ("remrole", &self.remrole)] {
            if !value.is_empty() && !ROLE_RE.is_match(value) {
                errors.add(
                    field,
                    "Roles are 1 to 32 letters, digits, dashes or underscores.",
                );
            }
        }
        errors
    }
}
