use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::{config::ListsConfig, error::ConfigError};

use super::{FieldLocator, ListRole};


/// Where a list sits among the matching list containers of a detail view. One based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ListPosition {
    /// The Nth container from the top.
    Nth(usize),
    /// The Nth container from the bottom, `FromEnd(1)` being the last.
    FromEnd(usize)
}

impl ListPosition {
    pub(crate) fn is_valid(self) -> bool {
        match self {
            Self::Nth(n) | Self::FromEnd(n) => n >= 1
        }
    }

    fn pick<T>(self, items: &[T]) -> Option<&T> {
        let index = match self {
            Self::Nth(n) => n.checked_sub(1)?,
            Self::FromEnd(n) => items.len().checked_sub(n)?
        };
        items.get(index)
    }
}


/// Assigns roles to lists by their position among same-looking list containers.
///
/// jobs.ch renders tasks and skills as identical bullet lists, so position is all there is to go on.
#[derive(Debug, Clone)]
pub(crate) struct PositionalLists {
    container: Selector,
    item: Selector,
    tasks: ListPosition,
    skills: ListPosition
}

impl PositionalLists {
    pub(crate) fn new(config: &ListsConfig) -> Result<Self, ConfigError> {
        let parse = |selector: &str| Selector::parse(selector).map_err(|_| ConfigError::Selector {
            section: "site.lists",
            selector: selector.to_string()
        });

        Ok(Self {
            container: parse(&config.container)?,
            item: parse(&config.item)?,
            tasks: config.tasks,
            skills: config.skills
        })
    }

    fn containers<'a>(&self, detail: &'a Html) -> Vec<ElementRef<'a>> {
        detail.select(&self.container).collect()
    }
}

impl FieldLocator for PositionalLists {
    const NAME: &'static str = "positional";

    fn fingerprint(&self, detail: &Html) -> String {
        self.containers(detail).iter().map(|c| c.html()).collect()
    }

    fn locate(&self, detail: &Html, role: ListRole) -> Option<Vec<String>> {
        let position = match role {
            ListRole::Tasks => self.tasks,
            ListRole::Skills => self.skills
        };
        let containers = self.containers(detail);
        let list = position.pick(&containers)?;

        Some(
            list
                .select(&self.item)
                .map(|item| item.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
                .filter(|text| !text.is_empty())
                .collect()
        )
    }

    /// Any count other than one container per role means at least one role may be mislabeled.
    fn is_ambiguous(&self, detail: &Html) -> bool {
        self.containers(detail).len() != ListRole::ALL.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn lists(tasks: ListPosition, skills: ListPosition) -> PositionalLists {
        PositionalLists::new(&ListsConfig {
            container: "ul.li-t_disc".into(),
            item: "li".into(),
            tasks,
            skills
        }).unwrap()
    }

    const DETAIL: &str = r#"
        <div>
            <h2>Deine Aufgaben</h2>
            <ul class="li-t_disc"><li> Build   models </li><li>Ship them</li><li>  </li></ul>
            <h2>Dein Profil</h2>
            <ul class="li-t_disc"><li>Python</li><li>SQL</li></ul>
            <ul class="nav"><li>Home</li></ul>
        </div>
    "#;

    #[test]
    fn picks_lists_by_position_from_top() {
        let html = Html::parse_document(DETAIL);
        let locator = lists(ListPosition::Nth(1), ListPosition::Nth(2));
        assert_eq!(locator.locate(&html, ListRole::Tasks).unwrap(), ["Build models", "Ship them"]);
        assert_eq!(locator.locate(&html, ListRole::Skills).unwrap(), ["Python", "SQL"]);
        assert!(!locator.is_ambiguous(&html));
    }

    #[test]
    fn picks_lists_by_position_from_end() {
        let html = Html::parse_document(DETAIL);
        let locator = lists(ListPosition::FromEnd(2), ListPosition::FromEnd(1));
        assert_eq!(locator.locate(&html, ListRole::Tasks).unwrap(), ["Build models", "Ship them"]);
        assert_eq!(locator.locate(&html, ListRole::Skills).unwrap(), ["Python", "SQL"]);
    }

    #[test]
    fn single_list_is_flagged_and_leaves_skills_missing() {
        let html = Html::parse_document(r#"<ul class="li-t_disc"><li>Everything</li></ul>"#);
        let locator = lists(ListPosition::Nth(1), ListPosition::Nth(2));
        assert_eq!(locator.locate(&html, ListRole::Tasks).unwrap(), ["Everything"]);
        assert_eq!(locator.locate(&html, ListRole::Skills), None);
        assert!(locator.is_ambiguous(&html));
    }

    #[test]
    fn fingerprint_covers_only_list_containers() {
        let locator = lists(ListPosition::Nth(1), ListPosition::Nth(2));
        let html = Html::parse_document(DETAIL);
        let fingerprint = locator.fingerprint(&html);
        assert!(fingerprint.contains("Ship them"));
        assert!(fingerprint.contains("SQL"));
        assert!(!fingerprint.contains("Home"));
        assert_eq!(locator.fingerprint(&Html::parse_document("<p>Apply by mail</p>")), "");
    }

    #[test]
    fn position_zero_is_invalid() {
        assert!(!ListPosition::Nth(0).is_valid());
        assert!(!ListPosition::FromEnd(0).is_valid());
        assert!(ListPosition::FromEnd(1).is_valid());
        assert_eq!(ListPosition::FromEnd(3).pick(&[1, 2]), None);
    }
}
