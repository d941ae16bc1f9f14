// Theme and language preferences.
//
// Both are explicit state containers owned by the application state rather
// than globals. The theme is persisted in the key-value store; the language
// lives for the process only.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{Store, THEME_KEY};

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme `{other}`")),
        }
    }
}

/// Current theme, backed by the `theme` key of the store.
pub struct ThemeState {
    theme: Theme,
    store: Arc<Store>,
}

impl ThemeState {
    /// Load the saved preference. Missing, unreadable, or unknown values
    /// fall back to the light theme.
    pub fn load(store: Arc<Store>) -> Self {
        let theme = match store.get(THEME_KEY) {
            Ok(Some(saved)) => saved.parse().unwrap_or_else(|e| {
                warn!("Ignoring saved theme preference: {}", e);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                warn!("Failed to load theme preference: {:#}", e);
                Theme::default()
            }
        };
        Self { theme, store }
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn is_dark_mode(&self) -> bool {
        self.theme == Theme::Dark
    }

    /// Switch between light and dark and persist the result. A failed write
    /// is logged; the in-memory theme still changes.
    pub fn toggle(&mut self) -> Theme {
        self.set(self.theme.toggled());
        self.theme
    }

    pub fn set(&mut self, theme: Theme) {
        self.theme = theme;
        if let Err(e) = self.store.set(THEME_KEY, theme.as_str()) {
            warn!("Failed to save theme preference: {:#}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Bn,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Bn => "bn",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "bn" | "bangla" | "bengali" => Ok(Language::Bn),
            other => Err(format!("unknown language `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LanguageState {
    language: Language,
    is_language_selected: bool,
}

impl LanguageState {
    pub fn language(&self) -> Language {
        self.language
    }

    /// Whether the user has passed the first-run language picker.
    pub fn is_language_selected(&self) -> bool {
        self.is_language_selected
    }

    pub fn select(&mut self, language: Language) {
        self.language = language;
        self.is_language_selected = true;
    }

    /// Translate `key`, returning the key itself when the catalog has no
    /// entry for it.
    pub fn t<'a>(&self, key: &'a str) -> &'a str {
        translate(self.language, key).unwrap_or(key)
    }
}

/// Message catalog for the strings the client itself produces (alerts and
/// status lines). Screen copy is not part of this crate.
fn translate(language: Language, key: &str) -> Option<&'static str> {
    let text = match (language, key) {
        (Language::En, "error") => "Error",
        (Language::Bn, "error") => "ত্রুটি",
        (Language::En, "success") => "Success",
        (Language::Bn, "success") => "সফল",
        (Language::En, "networkError") => "Network Error",
        (Language::Bn, "networkError") => "নেটওয়ার্ক ত্রুটি",
        (Language::En, "notAuthenticated") => "Not Authenticated",
        (Language::Bn, "notAuthenticated") => "প্রমাণীকৃত নয়",
        (Language::En, "noMedicinesFound") => "No medicines found",
        (Language::Bn, "noMedicinesFound") => "কোন ঔষধ পাওয়া যায়নি",
        (Language::En, "noMedicinesFoundDesc") => {
            "We could not identify any medicine in this image. Try again with a clearer photo."
        }
        (Language::Bn, "noMedicinesFoundDesc") => {
            "এই ছবিতে কোন ঔষধ শনাক্ত করা যায়নি। আরও পরিষ্কার ছবি দিয়ে আবার চেষ্টা করুন।"
        }
        (Language::En, "otpSent") => "OTP sent to your email",
        (Language::Bn, "otpSent") => "আপনার ইমেইলে OTP পাঠানো হয়েছে",
        (Language::En, "loginSuccess") => "Logged in successfully",
        (Language::Bn, "loginSuccess") => "সফলভাবে লগইন হয়েছে",
        (Language::En, "logout") => "Logout",
        (Language::Bn, "logout") => "লগআউট",
        (Language::En, "areYouSureLogout") => "Are you sure you want to logout?",
        (Language::Bn, "areYouSureLogout") => "আপনি কি লগআউট করতে চান?",
        (Language::En, "cancel") => "Cancel",
        (Language::Bn, "cancel") => "বাতিল করুন",
        (Language::En, "logoutSuccess") => "Logged out",
        (Language::Bn, "logoutSuccess") => "লগআউট হয়েছে",
        (Language::En, "profileUpdated") => "Profile updated",
        (Language::Bn, "profileUpdated") => "প্রোফাইল আপডেট হয়েছে",
        (Language::En, "profileImageUpdated") => "Profile image updated",
        (Language::Bn, "profileImageUpdated") => "প্রোফাইল ছবি আপডেট হয়েছে",
        (Language::En, "profileImageRemoved") => "Profile image removed",
        (Language::Bn, "profileImageRemoved") => "প্রোফাইল ছবি সরানো হয়েছে",
        (Language::En, "enterEmail") => "Please enter your email",
        (Language::Bn, "enterEmail") => "দয়া করে আপনার ইমেইল লিখুন",
        (Language::En, "enterNameAndEmail") => "Please enter your name and email",
        (Language::Bn, "enterNameAndEmail") => "অনুগ্রহ করে আপনার নাম এবং ইমেইল লিখুন",
        (Language::En, "enter4DigitOtp") => "Please enter the 4-digit OTP",
        (Language::Bn, "enter4DigitOtp") => "অনুগ্রহ করে ৪ সংখ্যার OTP লিখুন",
        _ => return None,
    };
    Some(text)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
