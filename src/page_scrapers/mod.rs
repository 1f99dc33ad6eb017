use scraper::Html;

mod positional;

pub(crate) use positional::{ListPosition, PositionalLists};


/// What a list on a job ad's detail view is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListRole {
    Tasks,
    Skills
}

impl ListRole {
    pub(crate) const ALL: [ListRole; 2] = [ListRole::Tasks, ListRole::Skills];
}


/// Finds the content of a field on a rendered detail view by the role it plays.
///
/// The site does not label its lists, so which list is which has to be decided by the
/// page layout. Everything that depends on that layout lives behind this trait, so a
/// change in markup means replacing one implementation and nothing else.
pub(crate) trait FieldLocator {
    const NAME: &'static str;

    /// Markup of everything the fields are read from, empty when none of it is on the page.
    ///
    /// Detail views replace each other in place, so a change in this is the only sign that a
    /// newly opened listing has rendered.
    fn fingerprint(&self, detail: &Html) -> String;

    /// The trimmed, non-empty items of the list playing `role`, or `None` if there is no such list.
    fn locate(&self, detail: &Html, role: ListRole) -> Option<Vec<String>>;

    /// Whether the layout of this detail view makes the role assignment a guess.
    fn is_ambiguous(&self, _detail: &Html) -> bool {
        false
    }
}
