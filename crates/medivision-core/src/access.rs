// Role-based screen access. The server owns real authorization; this only
// decides which screens and menus the client offers.

use serde::Serialize;

use crate::model::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    Dashboard,
    Scan,
    History,
    Profile,
    Settings,
    About,
    HelpSupport,
    PrivacyPolicy,
    AdminProfile,
    UserManagement,
    MedicineManagement,
}

impl Screen {
    pub const ALL: [Screen; 11] = [
        Screen::Dashboard,
        Screen::Scan,
        Screen::History,
        Screen::Profile,
        Screen::Settings,
        Screen::About,
        Screen::HelpSupport,
        Screen::PrivacyPolicy,
        Screen::AdminProfile,
        Screen::UserManagement,
        Screen::MedicineManagement,
    ];

    pub fn requires_admin(self) -> bool {
        matches!(
            self,
            Screen::AdminProfile | Screen::UserManagement | Screen::MedicineManagement
        )
    }

    /// Screens reachable while signed out.
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Screen::Dashboard | Screen::About | Screen::HelpSupport | Screen::PrivacyPolicy
        )
    }
}

/// Whether `user` (or an anonymous visitor when `None`) may open `screen`.
pub fn can_access(user: Option<&User>, screen: Screen) -> bool {
    match user {
        None => screen.is_public(),
        Some(u) if screen.requires_admin() => u.is_admin(),
        Some(u) => !(u.is_admin() && screen == Screen::Profile),
    }
}

/// Screens to list in navigation for `user`, in display order. Admins get
/// the admin profile in place of the regular one.
pub fn available_screens(user: Option<&User>) -> Vec<Screen> {
    Screen::ALL
        .into_iter()
        .filter(|s| can_access(user, *s))
        .collect()
}
