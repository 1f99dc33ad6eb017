use fxhash::FxHashSet;

use crate::record::ListingIdentity;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    New,
    /// Already scraped in this session, possibly before a restart.
    InSession,
    /// Already part of the master dataset.
    InMaster
}


/// Remembers every listing seen in this session and in the master dataset.
#[derive(Debug, Default)]
pub(crate) struct Deduplicator {
    session: FxHashSet<ListingIdentity>,
    master: FxHashSet<ListingIdentity>
}

impl Deduplicator {
    pub(crate) fn new(
        session: impl IntoIterator<Item = ListingIdentity>,
        master: impl IntoIterator<Item = ListingIdentity>
    ) -> Self {
        Self {
            session: session.into_iter().collect(),
            master: master.into_iter().collect()
        }
    }

    pub(crate) fn check(&self, identity: &ListingIdentity) -> Verdict {
        if self.session.contains(identity) {
            Verdict::InSession
        } else if self.master.contains(identity) {
            Verdict::InMaster
        } else {
            Verdict::New
        }
    }

    /// Records an accepted listing in both sets. Call this as soon as the listing is accepted.
    pub(crate) fn accept(&mut self, identity: ListingIdentity) {
        self.master.insert(identity.clone());
        self.session.insert(identity);
    }

    pub(crate) fn session_len(&self) -> usize {
        self.session.len()
    }

    pub(crate) fn master_len(&self) -> usize {
        self.master.len()
    }
}
