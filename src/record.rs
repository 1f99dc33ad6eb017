use std::{fmt, marker::PhantomData};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator placed between items of a task or skill list when it is stored in a single column.
pub(crate) const ITEM_SEPARATOR: &str = " | ";

/// Separator placed between the title and company of a listing identity.
pub(crate) const IDENTITY_SEPARATOR: &str = " | ";

/// Stored in place of a location that could not be read from the listing card.
pub(crate) const MISSING_LOCATION: &str = "Location N/A (Search View)";


/// Marker for the kind of list an [`ItemList`] holds, which decides its missing sentinel.
pub(crate) trait ListKind {
    const NAME: &'static str;
    const MISSING: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tasks;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Skills;

impl ListKind for Tasks {
    const NAME: &'static str = "tasks";
    const MISSING: &'static str = "no tasks found on this job ad";
}

impl ListKind for Skills {
    const NAME: &'static str = "skills";
    const MISSING: &'static str = "no skills found on this job ad";
}


/// An ordered list of bullet points taken from a job ad, or the fact that none could be found.
///
/// Serialized as the items joined by [`ITEM_SEPARATOR`], or as `K::MISSING` when there are no items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ItemList<K> {
    items: Vec<String>,
    kind: PhantomData<K>
}

impl<K: ListKind> ItemList<K> {
    pub(crate) fn new(items: Vec<String>) -> Self {
        Self { items, kind: PhantomData }
    }

    pub(crate) fn missing() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) fn is_missing(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn items(&self) -> &[String] {
        &self.items
    }

    /// The exact text stored in the CSV column. Keyword filters match against this.
    pub(crate) fn to_column(&self) -> String {
        if self.is_missing() {
            K::MISSING.to_string()
        } else {
            self.items.join(ITEM_SEPARATOR)
        }
    }

    pub(crate) fn from_column(column: &str) -> Self {
        let column = column.trim();
        if column.is_empty() || column == K::MISSING {
            return Self::missing();
        }
        Self::new(
            column
                .split(ITEM_SEPARATOR)
                .map(str::trim)
                .filter(|x| !x.is_empty())
                .map(String::from)
                .collect()
        )
    }
}

impl<K: ListKind> Serialize for ItemList<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_column())
    }
}

impl<'de, K: ListKind> Deserialize<'de> for ItemList<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let column = String::deserialize(deserializer)?;
        Ok(Self::from_column(&column))
    }
}


/// The deduplication key of a listing: trimmed title and company joined by [`IDENTITY_SEPARATOR`].
///
/// Comparison is exact and case sensitive, so near-duplicate titles are not merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ListingIdentity(String);

impl ListingIdentity {
    pub(crate) fn new(title: &str, company: &str) -> Self {
        Self(format!("{}{IDENTITY_SEPARATOR}{}", title.trim(), company.trim()))
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// One job advertisement, as stored in session, master and final files.
///
/// Field order is the column order of every file this crate writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JobRecord {
    #[serde(rename = "Job_Index")]
    pub(crate) index: u32,
    #[serde(rename = "Job_Title")]
    pub(crate) title: String,
    #[serde(rename = "Company_Name")]
    pub(crate) company: String,
    #[serde(rename = "Job_Location", default = "missing_location")]
    pub(crate) location: String,
    #[serde(rename = "Tasks")]
    pub(crate) tasks: ItemList<Tasks>,
    #[serde(rename = "Skills")]
    pub(crate) skills: ItemList<Skills>,
    /// Older files were written without this column.
    #[serde(rename = "Job_Search_Term", default)]
    pub(crate) search_term: String
}

fn missing_location() -> String {
    MISSING_LOCATION.to_string()
}

impl JobRecord {
    pub(crate) fn identity(&self) -> ListingIdentity {
        ListingIdentity::new(&self.title, &self.company)
    }
}


/// Turns a search term into a file name fragment, e.g. `"Data Scientist"` into `"data_scientist"`.
pub(crate) fn safe_term(search_term: &str) -> String {
    search_term
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}


#[cfg(test)]
pub(crate) fn record(index: u32, title: &str, company: &str, tasks: &[&str], skills: &[&str]) -> JobRecord {
    JobRecord {
        index,
        title: title.to_string(),
        company: company.to_string(),
        location: "Zürich".to_string(),
        tasks: ItemList::new(tasks.iter().map(|x| x.to_string()).collect()),
        skills: ItemList::new(skills.iter().map(|x| x.to_string()).collect()),
        search_term: "data scientist".to_string()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_trims_but_keeps_case() {
        let a = ListingIdentity::new("  Data Scientist ", "Acme AG\n");
        assert_eq!(a.as_str(), "Data Scientist | Acme AG");
        assert_ne!(a, ListingIdentity::new("data scientist", "Acme AG"));
    }

    #[test]
    fn empty_list_is_stored_as_sentinel() {
        assert_eq!(ItemList::<Tasks>::missing().to_column(), "no tasks found on this job ad");
        assert_eq!(ItemList::<Skills>::missing().to_column(), "no skills found on this job ad");
        assert!(ItemList::<Skills>::from_column("no skills found on this job ad").is_missing());
    }

    #[test]
    fn sentinel_of_other_kind_is_kept_as_text() {
        let list = ItemList::<Tasks>::from_column("no skills found on this job ad");
        assert!(!list.is_missing());
        assert_eq!(list.items(), ["no skills found on this job ad"]);
    }

    #[test]
    fn items_are_split_on_separator() {
        let list = ItemList::<Tasks>::from_column("Build models | Talk to people");
        assert_eq!(list.items(), ["Build models", "Talk to people"]);
        assert_eq!(list.to_column(), "Build models | Talk to people");
    }

    #[test]
    fn safe_term_matches_file_naming() {
        assert_eq!(safe_term("  Data   Scientist "), "data_scientist");
        assert_eq!(safe_term("C++ / ML-Engineer"), "c__mlengineer");
        assert_eq!(safe_term("Ärztin"), "rztin");
    }
}
