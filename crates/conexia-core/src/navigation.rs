//! Navigation shell
//!
//! Maps the fixed sidebar menu to routes and owns the logout flow. Routing
//! itself is delegated to a [`Navigator`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::session::SessionContext;

/// Route shown after logout
pub const ENTRY_ROUTE: &str = "/";

/// Screens reachable from the sidebar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Screen {
    Dashboard,
    Whatsapp,
    Assistants,
    Projects,
    Training,
    KnowledgeBases,
}

impl Screen {
    /// Route for this screen; `None` for screens rendered in place
    pub fn path(&self) -> Option<&'static str> {
        match self {
            Self::Dashboard => Some("/dashboard"),
            Self::Whatsapp => Some("/whatsapp"),
            Self::Assistants => Some("/assistants"),
            Self::Projects => Some("/projetos"),
            Self::Training => Some("/training"),
            Self::KnowledgeBases => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Whatsapp => "whatsapp",
            Self::Assistants => "assistants",
            Self::Projects => "projetos",
            Self::Training => "training",
            Self::KnowledgeBases => "knowledge-bases",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            Self::Dashboard,
            Self::Whatsapp,
            Self::Assistants,
            Self::Projects,
            Self::Training,
            Self::KnowledgeBases,
        ]
        .into_iter()
        .find(|s| s.as_str() == value)
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sidebar entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: &'static str,
    /// `None` for entries without a screen yet
    pub screen: Option<Screen>,
    pub active: bool,
}

impl MenuItem {
    /// Disabled entries are shown muted and ignore clicks
    pub fn is_enabled(&self) -> bool {
        self.screen.is_some()
    }
}

const MENU: [(&str, Option<Screen>); 6] = [
    ("Dashboard", Some(Screen::Dashboard)),
    ("WhatsApp", Some(Screen::Whatsapp)),
    ("Personalizar", Some(Screen::Assistants)),
    ("Projetos", Some(Screen::Projects)),
    ("Treinamento", Some(Screen::Training)),
    ("Estatísticas", None),
];

/// The fixed sidebar menu with `active` highlighted
pub fn menu(active: Screen) -> Vec<MenuItem> {
    MENU.iter()
        .map(|&(label, screen)| MenuItem {
            label,
            screen,
            active: screen == Some(active),
        })
        .collect()
}

/// Route transitions, provided by the host application
pub trait Navigator: Send + Sync {
    fn navigate_to(&self, path: &str);
}

/// Navigator that records every transition in memory
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for HistoryNavigator {
    fn navigate_to(&self, path: &str) {
        self.lock().push(path.to_string());
    }
}

/// Sidebar state and actions
pub struct Sidebar {
    active: Screen,
    collapsed: bool,
    session: SessionContext,
    navigator: Arc<dyn Navigator>,
    default_avatar: String,
}

impl fmt::Debug for Sidebar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sidebar")
            .field("active", &self.active)
            .field("collapsed", &self.collapsed)
            .finish()
    }
}

impl Sidebar {
    pub fn new(
        session: SessionContext,
        navigator: Arc<dyn Navigator>,
        default_avatar: impl Into<String>,
    ) -> Self {
        Self {
            active: Screen::Dashboard,
            collapsed: false,
            session,
            navigator,
            default_avatar: default_avatar.into(),
        }
    }

    pub fn active(&self) -> Screen {
        self.active
    }

    pub fn menu(&self) -> Vec<MenuItem> {
        menu(self.active)
    }

    /// Activate `screen` and navigate to its route, if it has one
    ///
    /// Returns false for disabled entries, which change nothing.
    pub fn select(&mut self, screen: Option<Screen>) -> bool {
        let Some(screen) = screen else {
            return false;
        };
        self.active = screen;
        match screen.path() {
            Some(path) => {
                debug!(%screen, path, "Navigating");
                self.navigator.navigate_to(path);
            }
            None => debug!(%screen, "Screen activated in place"),
        }
        true
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn toggle_collapse(&mut self) -> bool {
        self.collapsed = !self.collapsed;
        self.collapsed
    }

    pub fn user_name(&self) -> String {
        self.session.user().map(|u| u.name).unwrap_or_default()
    }

    /// The user's avatar, or the product default
    pub fn avatar_url(&self) -> String {
        self.session
            .user()
            .and_then(|u| u.avatar_url)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.default_avatar.clone())
    }

    /// Clear the session, then return to the entry route
    pub fn logout(&mut self) {
        self.session.clear();
        info!("Logged out");
        self.navigator.navigate_to(ENTRY_ROUTE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{CompanyId, SessionState, UserProfile};

    const AVATAR: &str = "https://cdn.example/default.png";

    fn sidebar() -> (SessionContext, Arc<HistoryNavigator>, Sidebar) {
        let session = SessionContext::new();
        session.sign_in(
            CompanyId::new("acme"),
            Some(UserProfile::new("Ana")),
        );
        let navigator = Arc::new(HistoryNavigator::new());
        let sidebar = Sidebar::new(session.clone(), navigator.clone(), AVATAR);
        (session, navigator, sidebar)
    }

    #[test]
    fn test_screen_routes() {
        assert_eq!(Screen::Projects.path(), Some("/projetos"));
        assert_eq!(Screen::Whatsapp.path(), Some("/whatsapp"));
        assert_eq!(Screen::KnowledgeBases.path(), None);
        assert_eq!(Screen::parse("knowledge-bases"), Some(Screen::KnowledgeBases));
        assert_eq!(Screen::parse("nope"), None);
    }

    #[test]
    fn test_menu_is_fixed_with_one_disabled_entry() {
        let items = menu(Screen::Projects);
        let labels: Vec<_> = items.iter().map(|i| i.label).collect();
        assert_eq!(
            labels,
            vec!["Dashboard", "WhatsApp", "Personalizar", "Projetos", "Treinamento", "Estatísticas"]
        );
        assert_eq!(items.iter().filter(|i| i.active).count(), 1);
        assert!(items[3].active);
        assert!(!items[5].is_enabled());
        assert!(!items[5].active);
    }

    #[test]
    fn test_select_navigates() {
        let (_, navigator, mut sidebar) = sidebar();
        assert!(sidebar.select(Some(Screen::Training)));
        assert_eq!(sidebar.active(), Screen::Training);
        assert_eq!(navigator.current().as_deref(), Some("/training"));
    }

    #[test]
    fn test_disabled_entry_is_inert() {
        let (_, navigator, mut sidebar) = sidebar();
        sidebar.select(Some(Screen::Projects));

        assert!(!sidebar.select(None));
        assert_eq!(sidebar.active(), Screen::Projects);
        assert_eq!(navigator.history(), vec!["/projetos"]);
    }

    #[test]
    fn test_screen_without_route_activates_in_place() {
        let (_, navigator, mut sidebar) = sidebar();
        assert!(sidebar.select(Some(Screen::KnowledgeBases)));
        assert_eq!(sidebar.active(), Screen::KnowledgeBases);
        assert!(navigator.history().is_empty());
    }

    #[test]
    fn test_avatar_falls_back_to_default() {
        let (session, _, sidebar) = sidebar();
        assert_eq!(sidebar.user_name(), "Ana");
        assert_eq!(sidebar.avatar_url(), AVATAR);

        session.sign_in(
            CompanyId::new("acme"),
            Some(UserProfile::new("Ana").with_avatar("https://cdn.example/ana.png")),
        );
        assert_eq!(sidebar.avatar_url(), "https://cdn.example/ana.png");
    }

    #[test]
    fn test_toggle_collapse() {
        let (_, _, mut sidebar) = sidebar();
        assert!(sidebar.toggle_collapse());
        assert!(!sidebar.toggle_collapse());
    }

    #[test]
    fn test_logout_clears_everything_then_redirects() {
        let (session, navigator, mut sidebar) = sidebar();
        let mut rx = session.watch();

        sidebar.logout();

        assert_eq!(session.snapshot(), SessionState::default());
        assert_eq!(navigator.current().as_deref(), Some(ENTRY_ROUTE));
        assert_eq!(sidebar.user_name(), "");

        // One atomic update: observers never see a half-cleared session
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SessionState::default());
        assert!(!rx.has_changed().unwrap());
    }
}
